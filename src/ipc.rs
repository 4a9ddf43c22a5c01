use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tracing::{error, trace, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, ERROR_PIPE_CONNECTED, GENERIC_WRITE, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_NONE, OPEN_EXISTING,
    PIPE_ACCESS_DUPLEX,
};
use windows::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PIPE_READMODE_MESSAGE,
    PIPE_TYPE_MESSAGE, PIPE_UNLIMITED_INSTANCES, PIPE_WAIT,
};

const PIPE_BUFFER_SIZE: u32 = 4096;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn pipe_path(name: &str) -> String {
    format!(r"\\.\pipe\{name}")
}

/// Blocking named-pipe server on a dedicated thread. Each received message is
/// a discrete UTF-16 string handed to the callback.
pub struct PipeServer {
    pipe_name: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PipeServer {
    pub fn spawn(name: &str, on_message: impl Fn(String) + Send + 'static) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let path = pipe_path(name);
        let path_w = wide(&path);

        let thread = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                let pipe = unsafe {
                    CreateNamedPipeW(
                        PCWSTR(path_w.as_ptr()),
                        PIPE_ACCESS_DUPLEX,
                        PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_WAIT,
                        PIPE_UNLIMITED_INSTANCES,
                        PIPE_BUFFER_SIZE,
                        PIPE_BUFFER_SIZE,
                        0,
                        None,
                    )
                };
                if pipe.is_invalid() {
                    error!("failed to create pipe instance");
                    std::thread::sleep(std::time::Duration::from_millis(500));
                    continue;
                }

                let connected = match unsafe { ConnectNamedPipe(pipe, None) } {
                    Ok(()) => true,
                    Err(err) => err.code() == ERROR_PIPE_CONNECTED.to_hresult(),
                };

                if connected && !stop_flag.load(Ordering::SeqCst) {
                    let mut buffer = [0u8; PIPE_BUFFER_SIZE as usize];
                    let mut read = 0u32;
                    while unsafe { ReadFile(pipe, Some(&mut buffer), Some(&mut read), None) }
                        .is_ok()
                        && read > 0
                    {
                        let text = decode_utf16(&buffer[..read as usize]);
                        if !text.is_empty() {
                            trace!("pipe message received: {text}");
                            on_message(text);
                        }
                        read = 0;
                    }
                }

                unsafe {
                    let _ = DisconnectNamedPipe(pipe);
                    let _ = CloseHandle(pipe);
                }
            }
        });

        Ok(Self {
            pipe_name: name.to_string(),
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for PipeServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Connect a throwaway client so the blocking accept wakes up. If no
        // instance is pending the thread is left to die with the process.
        match send_message(&self.pipe_name, "") {
            Ok(()) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
            }
            Err(err) => warn!("failed to nudge pipe server during shutdown: {err}"),
        }
    }
}

/// One-shot client send: connect to the named pipe and write a single UTF-16
/// message.
pub fn send_message(name: &str, message: &str) -> Result<()> {
    let path = pipe_path(name);
    let path_w = wide(&path);

    let pipe: HANDLE = unsafe {
        CreateFileW(
            PCWSTR(path_w.as_ptr()),
            GENERIC_WRITE.0,
            FILE_SHARE_NONE,
            None,
            OPEN_EXISTING,
            FILE_FLAGS_AND_ATTRIBUTES(0),
            None,
        )
    }
    .with_context(|| format!("failed to open pipe {path}"))?;

    let bytes: Vec<u8> = message
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    let mut written = 0u32;
    let result = unsafe { WriteFile(pipe, Some(&bytes), Some(&mut written), None) };
    unsafe {
        let _ = CloseHandle(pipe);
    }

    result.with_context(|| format!("failed to write to pipe {path}"))?;
    Ok(())
}

fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_matches('\0')
        .to_string()
}
