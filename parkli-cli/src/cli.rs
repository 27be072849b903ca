//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Live parking availability for Swiss cities.
#[derive(Debug, Parser)]
#[command(name = "parkli", version, propagate_version = true)]
pub(crate) struct Cli {
    /// Settings file, `parkli.toml` in the working directory by default
    #[arg(long, short = 'c', env = "PARKLI_CONFIG", global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Emit compact JSON instead of pretty-printed output
    #[arg(long, global = true)]
    pub(crate) compact: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List supported cities
    Cities,
    /// Show all facilities of a city
    City {
        /// City id, e.g. `zurich`
        city: String,
    },
    /// Show a single facility
    Facility {
        /// City id, e.g. `bern`
        city: String,
        /// Facility id, e.g. `parkhaus-metro`
        facility: String,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn facility_takes_city_and_id() {
        let cli = Cli::try_parse_from(["parkli", "--compact", "facility", "bern", "parkhaus-metro"])
            .expect("arguments are valid");
        assert!(cli.compact);
        assert!(matches!(
            cli.command,
            Command::Facility { ref city, ref facility } if city == "bern" && facility == "parkhaus-metro"
        ));
    }
}
