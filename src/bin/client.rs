use std::process::ExitCode;

use clap::Parser;

/// Ask the running respace service to restore a workspace.
#[derive(Parser, Debug)]
#[command(name = "respace")]
#[command(about = "Sends a workspace restore request to the respace service")]
struct Args {
    /// Identifier of the workspace to restore
    workspace_id: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match send(&args.workspace_id) {
        Ok(()) => {
            println!("workspace launch request sent: {}", args.workspace_id);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to send workspace launch request: {err}");
            ExitCode::from(1)
        }
    }
}

#[cfg(windows)]
fn send(workspace_id: &str) -> anyhow::Result<()> {
    respace::ipc::send_message(respace::service::SERVICE_PIPE_NAME, workspace_id)
}

#[cfg(not(windows))]
fn send(_workspace_id: &str) -> anyhow::Result<()> {
    anyhow::bail!("the respace service pipe is only available on Windows")
}
