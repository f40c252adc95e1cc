use std::io::{self, Write};

use clap_complete::{generate, Shell};

use crate::app::AppError;

pub fn generate_completions(shell: Shell, buf: &mut dyn Write) {
    let mut cmd = crate::cli::styled_command();
    generate(shell, &mut cmd, "mill", buf);
}

pub fn detect_current_shell() -> Option<Shell> {
    shell_from_path(&std::env::var("SHELL").ok()?)
}

fn shell_from_path(shell_var: &str) -> Option<Shell> {
    match shell_var.rsplit('/').next()? {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "powershell" | "pwsh" => Some(Shell::PowerShell),
        _ => None,
    }
}

pub fn run_completions_command(shell: Option<Shell>) -> Result<(), AppError> {
    let shell = match shell {
        Some(shell) => shell,
        None => detect_current_shell().ok_or_else(|| {
            AppError::InvalidArgument(
                "unable to detect shell from $SHELL; pass a shell name".to_string(),
            )
        })?,
    };
    let mut stdout = io::stdout().lock();
    generate_completions(shell, &mut stdout);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_is_taken_from_the_path_basename() {
        assert_eq!(shell_from_path("/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(shell_from_path("/usr/bin/bash"), Some(Shell::Bash));
        assert_eq!(shell_from_path("/usr/local/bin/fish"), Some(Shell::Fish));
        assert_eq!(shell_from_path("/usr/bin/pwsh"), Some(Shell::PowerShell));
        assert_eq!(shell_from_path("/usr/bin/csh"), None);
    }

    #[test]
    fn generated_script_names_the_binary_and_subcommands() {
        let mut buf = Vec::new();
        generate_completions(Shell::Bash, &mut buf);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("mill"));
        assert!(text.contains("quality"));
        assert!(text.contains("verify"));
    }
}
