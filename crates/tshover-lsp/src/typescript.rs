use anyhow::{Context, Result, anyhow};
use tokio::process::Command;

/// Check that the configured language server can be executed at all.
pub async fn preflight_language_server(command: &str) -> Result<String> {
    let mut last_error = None;
    for args in [["--version"].as_slice(), ["--help"].as_slice()] {
        let output = Command::new(command)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run `{command} {}`", args.join(" ")));
        match output {
            Ok(output) if output.status.success() => {
                return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
            Ok(_) => {}
            Err(err) => last_error = Some(err),
        }
    }

    let hint = anyhow!(
        "`{command}` is not runnable. Install it (e.g. `npm i -g typescript typescript-language-server`) or set TSHOVER_TSSERVER_COMMAND / [server].command."
    );
    Err(match last_error {
        Some(err) => err.context(hint.to_string()),
        None => hint,
    })
}
