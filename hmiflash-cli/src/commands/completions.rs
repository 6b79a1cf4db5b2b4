//! Shell completion generation.

use {
    clap::CommandFactory,
    clap_complete::{Shell, generate},
    std::io::{self, Write},
};

use crate::Cli;

fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

/// Generate shell completions to stdout.
pub(crate) fn cmd_completions(shell: Shell) {
    write_completions(shell, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completions_for(shell: Shell) -> String {
        let mut buf = Vec::new();
        write_completions(shell, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_bash_completions_name_subcommands() {
        let output = completions_for(Shell::Bash);
        assert!(output.contains("hmiflash"));
        assert!(output.contains("upload"));
        assert!(output.contains("list-ports"));
    }

    #[test]
    fn test_zsh_completions_generate_output() {
        assert!(completions_for(Shell::Zsh).contains("hmiflash"));
    }

    #[test]
    fn test_fish_completions_generate_output() {
        assert!(completions_for(Shell::Fish).contains("hmiflash"));
    }

    #[test]
    fn test_powershell_completions_generate_output() {
        assert!(!completions_for(Shell::PowerShell).is_empty());
    }
}
