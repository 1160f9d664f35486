#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use delve_cli::Cli;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from(["delve", "run", "--timeout-secs", "30", "--json"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["delve", "doctor", "--config", "/tmp/delve.toml", "-v"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let cli = Cli::try_parse_from(["delve", "run", "--verbose", "--quiet"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["delve"]).is_err());
        assert!(Cli::try_parse_from(["delve", "explore"]).is_err());
    }

    #[test]
    fn test_timeout_must_be_numeric() {
        let cli = Cli::try_parse_from(["delve", "run", "--timeout-secs", "soon"]);
        assert!(cli.is_err());
    }
}
