use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use anyhow::{bail, Context, Result};
use tracing::trace;
use windows::core::{BOOL, HSTRING, PCWSTR, PWSTR};
use windows::Management::Deployment::PackageManager;
use windows::Win32::Foundation::{CloseHandle, ERROR_SUCCESS, HWND, LPARAM, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW,
};
use windows::Win32::Storage::FileSystem::{GetFileAttributesW, INVALID_FILE_ATTRIBUTES};
use windows::Win32::System::Threading::{
    CreateProcessW, OpenProcess, QueryFullProcessImageNameW, PROCESS_CREATION_FLAGS,
    PROCESS_INFORMATION, PROCESS_NAME_FORMAT, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    STARTF_USESHOWWINDOW, STARTUPINFOW,
};
use windows::Win32::UI::Shell::{
    GetApplicationUserModelId, ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SEE_MASK_NO_CONSOLE,
    SHELLEXECUTEINFOW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetAncestor, GetWindowLongW, GetWindowPlacement, GetWindowRect,
    GetWindowTextLengthW, GetWindowThreadProcessId, IsWindow, IsWindowVisible, SetWindowPos,
    ShowWindow, GA_ROOTOWNER, GWL_EXSTYLE, GWL_STYLE, SWP_DEFERERASE, SWP_NOACTIVATE,
    SWP_NOCOPYBITS, SWP_NOZORDER, SW_FORCEMINIMIZE, SW_MAXIMIZE, SW_SHOWMINNOACTIVE,
    SW_SHOWMAXIMIZED, SW_SHOWMINIMIZED, SW_SHOWNOACTIVATE, WINDOWPLACEMENT, WINDOW_EX_STYLE,
    WINDOW_STYLE, WS_CAPTION, WS_EX_TOOLWINDOW, WS_POPUP,
};

use crate::desktop::{Desktop, InstalledApp, WindowId};
use crate::hwnd;
use crate::model::{MonitorSpec, Rect, WindowState};

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn rect_from(rect: RECT) -> Rect {
    Rect::new(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = unsafe { &mut *(lparam.0 as *mut Vec<WindowId>) };
    if is_standard_window(hwnd) {
        windows.push(WindowId(hwnd.0 as isize));
    }
    TRUE
}

/// Visibility/role filter applied during enumeration: visible root-owner
/// windows with a title and without the tool-window style.
fn is_standard_window(hwnd: HWND) -> bool {
    unsafe {
        if !IsWindowVisible(hwnd).as_bool() {
            return false;
        }
        if GetAncestor(hwnd, GA_ROOTOWNER) != hwnd {
            return false;
        }
        if GetWindowTextLengthW(hwnd) == 0 {
            return false;
        }
        let ex_style = WINDOW_EX_STYLE(GetWindowLongW(hwnd, GWL_EXSTYLE) as u32);
        !ex_style.contains(WS_EX_TOOLWINDOW)
    }
}

pub fn enumerate_windows() -> Result<Vec<WindowId>> {
    let mut windows: Vec<WindowId> = Vec::new();
    unsafe {
        EnumWindows(Some(enum_windows_proc), LPARAM(&mut windows as *mut _ as isize))
            .context("EnumWindows failed")?;
    }
    Ok(windows)
}

pub fn is_popup_window(hwnd: HWND) -> bool {
    unsafe {
        let style = WINDOW_STYLE(GetWindowLongW(hwnd, GWL_STYLE) as u32);
        let ex_style = WINDOW_EX_STYLE(GetWindowLongW(hwnd, GWL_EXSTYLE) as u32);
        (style.contains(WS_POPUP) && !style.contains(WS_CAPTION))
            || ex_style.contains(WS_EX_TOOLWINDOW)
    }
}

pub fn process_path(hwnd: HWND) -> Option<String> {
    unsafe {
        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        if process_id == 0 {
            return None;
        }

        let process_handle =
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, process_id).ok()?;

        let mut path_buffer: Vec<u16> = vec![0; 1024];
        let mut size: u32 = path_buffer.len() as u32;
        let result = QueryFullProcessImageNameW(
            process_handle,
            PROCESS_NAME_FORMAT(0),
            PWSTR(path_buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(process_handle);

        if result.is_ok() && size > 0 {
            path_buffer.truncate(size as usize);
            Some(OsString::from_wide(&path_buffer).to_string_lossy().into_owned())
        } else {
            None
        }
    }
}

pub fn window_aumid(hwnd: HWND) -> Option<String> {
    unsafe {
        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        if process_id == 0 {
            return None;
        }

        let process_handle =
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, process_id).ok()?;

        let mut buffer = [0u16; 1024];
        let mut length = buffer.len() as u32;
        let result =
            GetApplicationUserModelId(process_handle, &mut length, PWSTR(buffer.as_mut_ptr()));
        let _ = CloseHandle(process_handle);

        // Unpackaged processes have no application identity.
        if result == ERROR_SUCCESS && length > 1 {
            Some(String::from_utf16_lossy(&buffer[..(length - 1) as usize]))
        } else {
            None
        }
    }
}

pub fn window_state(hwnd: HWND) -> WindowState {
    unsafe {
        let mut placement = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };
        if GetWindowPlacement(hwnd, &mut placement).is_err() {
            return WindowState::Normal;
        }
        match placement.showCmd {
            cmd if cmd == SW_SHOWMINIMIZED.0 as u32 => WindowState::Minimized,
            cmd if cmd == SW_SHOWMAXIMIZED.0 as u32 => WindowState::Maximized,
            _ => WindowState::Normal,
        }
    }
}

pub fn window_rect(hwnd: HWND) -> Option<Rect> {
    unsafe {
        let mut rect = RECT::default();
        GetWindowRect(hwnd, &mut rect).ok()?;
        Some(rect_from(rect))
    }
}

unsafe extern "system" fn monitor_enum_proc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _lprc_monitor: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = unsafe { &mut *(lparam.0 as *mut Vec<MonitorSpec>) };

    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

    if unsafe { GetMonitorInfoW(hmonitor, &mut info as *mut _ as *mut MONITORINFO) }.as_bool() {
        let device_name = String::from_utf16_lossy(&info.szDevice);
        monitors.push(MonitorSpec {
            id: device_name.trim_end_matches('\0').to_string(),
            device: rect_from(info.monitorInfo.rcMonitor),
            work: rect_from(info.monitorInfo.rcWork),
        });
    }

    TRUE
}

pub fn enumerate_monitors() -> Vec<MonitorSpec> {
    let mut monitors: Vec<MonitorSpec> = Vec::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(monitor_enum_proc),
            LPARAM(&mut monitors as *mut _ as isize),
        );
    }
    monitors
}

pub fn force_minimize(hwnd: HWND) -> bool {
    unsafe {
        if !IsWindow(Some(hwnd)).as_bool() {
            return false;
        }
        ShowWindow(hwnd, SW_FORCEMINIMIZE).as_bool()
    }
}

pub fn show_no_activate(hwnd: HWND) {
    unsafe {
        let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
    }
}

pub fn maximize(hwnd: HWND) -> bool {
    unsafe {
        if !IsWindow(Some(hwnd)).as_bool() {
            return false;
        }
        ShowWindow(hwnd, SW_MAXIMIZE).as_bool()
    }
}

pub fn set_window_pos(hwnd: HWND, rect: Rect) -> bool {
    unsafe {
        if !IsWindow(Some(hwnd)).as_bool() {
            return false;
        }
        SetWindowPos(
            hwnd,
            None,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            SWP_NOZORDER | SWP_NOACTIVATE | SWP_NOCOPYBITS | SWP_DEFERERASE,
        )
        .is_ok()
    }
}

pub fn file_exists(path: &str) -> bool {
    let path_w = wide(path);
    unsafe { GetFileAttributesW(PCWSTR(path_w.as_ptr())) != INVALID_FILE_ATTRIBUTES }
}

fn create_process(path: &str, args: &str, cwd: &str) -> Result<()> {
    let app = wide(path);
    let mut command_line = wide(format!("\"{path}\" {args}").trim_end());
    let cwd_w = wide(cwd);

    let mut si = STARTUPINFOW::default();
    si.cb = std::mem::size_of::<STARTUPINFOW>() as u32;
    si.dwFlags = STARTF_USESHOWWINDOW;
    si.wShowWindow = SW_SHOWMINNOACTIVE.0 as u16;
    let mut pi = PROCESS_INFORMATION::default();

    unsafe {
        CreateProcessW(
            PCWSTR(app.as_ptr()),
            Some(PWSTR(command_line.as_mut_ptr())),
            None,
            None,
            false,
            PROCESS_CREATION_FLAGS(0),
            None,
            if cwd.is_empty() {
                PCWSTR::null()
            } else {
                PCWSTR(cwd_w.as_ptr())
            },
            &si,
            &mut pi,
        )
        .with_context(|| format!("CreateProcess failed for {path}"))?;
        let _ = CloseHandle(pi.hProcess);
        let _ = CloseHandle(pi.hThread);
    }
    Ok(())
}

fn shell_execute(path: &str, args: &str, cwd: &str, elevated: bool) -> Result<()> {
    let file = wide(path);
    let params = wide(args);
    let dir = wide(cwd);
    let verb = wide(if elevated { "runas" } else { "open" });

    let mut sei = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS | SEE_MASK_NO_CONSOLE,
        lpVerb: PCWSTR(verb.as_ptr()),
        lpFile: PCWSTR(file.as_ptr()),
        lpParameters: if args.is_empty() {
            PCWSTR::null()
        } else {
            PCWSTR(params.as_ptr())
        },
        lpDirectory: if cwd.is_empty() {
            PCWSTR::null()
        } else {
            PCWSTR(dir.as_ptr())
        },
        nShow: SW_SHOWMINNOACTIVE.0,
        ..Default::default()
    };

    unsafe {
        ShellExecuteExW(&mut sei).with_context(|| format!("ShellExecuteEx failed for {path}"))?;
        if !sei.hProcess.is_invalid() {
            let _ = CloseHandle(sei.hProcess);
        }
    }
    Ok(())
}

pub fn spawn_process(path: &str, args: &str, cwd: &str, elevated: bool) -> Result<()> {
    if !elevated {
        match create_process(path, args, cwd) {
            Ok(()) => return Ok(()),
            Err(err) => trace!("{err}, falling back to ShellExecuteEx"),
        }
    }
    shell_execute(path, args, cwd, elevated)
}

pub fn launch_packaged(package_full_name: &str) -> Result<()> {
    let manager = PackageManager::new()?;
    let packages = manager.FindPackagesByUserSecurityId(&HSTRING::new())?;
    for package in packages {
        if package.Id()?.FullName()?.to_string_lossy() != package_full_name {
            continue;
        }
        let entries = package.GetAppListEntriesAsync()?.get()?;
        if entries.Size()? == 0 {
            bail!("no app entries found for the package");
        }
        if !entries.GetAt(0)?.LaunchAsync()?.get()? {
            bail!("app list entry launch returned failure");
        }
        return Ok(());
    }
    bail!("package {package_full_name} is not installed for the current user")
}

pub fn installed_apps() -> Vec<InstalledApp> {
    let mut apps = Vec::new();
    let Ok(manager) = PackageManager::new() else {
        return apps;
    };
    let Ok(packages) = manager.FindPackagesByUserSecurityId(&HSTRING::new()) else {
        return apps;
    };
    for package in packages {
        let Ok(operation) = package.GetAppListEntriesAsync() else {
            continue;
        };
        let Ok(entries) = operation.get() else {
            continue;
        };
        for entry in entries {
            let Ok(aumid) = entry.AppUserModelId() else {
                continue;
            };
            let display_name = entry
                .DisplayInfo()
                .and_then(|info| info.DisplayName())
                .map(|name| name.to_string_lossy())
                .unwrap_or_default();
            apps.push(InstalledApp {
                aumid: aumid.to_string_lossy(),
                display_name,
            });
        }
    }
    apps
}

/// The live windowing environment.
#[derive(Default)]
pub struct Win32Desktop;

impl Win32Desktop {
    pub fn new() -> Self {
        Self
    }
}

impl Desktop for Win32Desktop {
    fn list_windows(&self) -> Result<Vec<WindowId>> {
        enumerate_windows()
    }

    fn is_popup(&self, window: WindowId) -> bool {
        is_popup_window(hwnd!(window.0))
    }

    fn process_path(&self, window: WindowId) -> Option<String> {
        process_path(hwnd!(window.0))
    }

    fn window_aumid(&self, window: WindowId) -> Option<String> {
        window_aumid(hwnd!(window.0))
    }

    fn window_state(&self, window: WindowId) -> WindowState {
        window_state(hwnd!(window.0))
    }

    fn window_rect(&self, window: WindowId) -> Option<Rect> {
        window_rect(hwnd!(window.0))
    }

    fn monitors(&self) -> Vec<MonitorSpec> {
        enumerate_monitors()
    }

    fn force_minimize(&self, window: WindowId) -> bool {
        force_minimize(hwnd!(window.0))
    }

    fn show_no_activate(&self, window: WindowId) {
        show_no_activate(hwnd!(window.0))
    }

    fn set_window_pos(&self, window: WindowId, rect: Rect) -> bool {
        set_window_pos(hwnd!(window.0), rect)
    }

    fn maximize(&self, window: WindowId) -> bool {
        maximize(hwnd!(window.0))
    }

    fn spawn(&self, path: &str, args: &str, cwd: &str, elevated: bool) -> Result<()> {
        spawn_process(path, args, cwd, elevated)
    }

    fn launch_packaged(&self, package_full_name: &str) -> Result<()> {
        launch_packaged(package_full_name)
    }

    fn launch_shell_aumid(&self, aumid: &str, args: &str, elevated: bool) -> Result<()> {
        spawn_process(&format!("shell:AppsFolder\\{aumid}"), args, "", elevated)
    }

    fn file_exists(&self, path: &str) -> bool {
        file_exists(path)
    }

    fn installed_apps(&self) -> Vec<InstalledApp> {
        installed_apps()
    }
}
