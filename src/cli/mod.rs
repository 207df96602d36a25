// FILE: src/cli/mod.rs

mod config;
mod handlers;

use crate::error::Result;
use crate::CompilerOptions;
use clap::{Arg, ArgAction, Command};

pub struct Cli {
    config: config::ConfigFile,
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"))?;
        let Some((name, sub_matches)) = matches.subcommand() else {
            println!("No subcommand specified. Use --help for usage information.");
            return Ok(());
        };
        // Global flags are propagated to the subcommand matches
        let options = self.build_compiler_options(sub_matches);

        match name {
            "compile" => handlers::handle_compile_command(self, sub_matches, &options),
            "theme" => handlers::handle_theme_command(sub_matches, &options),
            "compat" => handlers::handle_compat_command(sub_matches, &options),
            "schema" => handlers::handle_schema_command(sub_matches, &options),
            _ => {
                println!("Unknown subcommand '{}'. Use --help for usage information.", name);
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Makeup Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .arg(
                Arg::new("prefix")
                    .long("prefix")
                    .value_name("PREFIX")
                    .help("Custom property prefix")
                    .global(true),
            )
            .arg(
                Arg::new("context-prefix")
                    .long("context-prefix")
                    .value_name("PREFIX")
                    .help("Context class name prefix")
                    .global(true),
            )
            .arg(
                Arg::new("debug")
                    .short('d')
                    .long("debug")
                    .help("Enable debug mode with extra logging")
                    .action(ArgAction::SetTrue)
                    .global(true),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile cfg() stylesheets to custom properties and usage files")
                    .arg(Arg::new("input").help("Input CSS file or directory").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory"))
                    .arg(Arg::new("stats").long("stats").help("Show compilation statistics as JSON").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("theme")
                    .about("Flatten a theme source into custom property CSS")
                    .arg(Arg::new("input").help("Theme file or directory").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output CSS file"))
                    .arg(Arg::new("json").long("json").value_name("FILE").help("Also write the processed theme as JSON")),
            )
            .subcommand(
                Command::new("compat")
                    .about("Generate compatibility CSS for one theme")
                    .arg(Arg::new("theme").short('t').long("theme").value_name("PATH").help("Theme file or directory").required(true))
                    .arg(Arg::new("input").help("Compiled CSS files or directories").required(true).num_args(1..).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output CSS file")),
            )
            .subcommand(
                Command::new("schema")
                    .about("Extract the usage schema from compiled CSS")
                    .arg(Arg::new("input").help("Compiled CSS file").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output JSON file")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }

    /// Flags take precedence over the config file.
    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> CompilerOptions {
        let mut options = CompilerOptions::default();
        let config = &self.config;

        if let Some(prefix) = matches.get_one::<String>("prefix").or(config.custom_property_prefix.as_ref()) {
            options.custom_property_prefix = prefix.clone();
        }
        if let Some(prefix) = matches
            .get_one::<String>("context-prefix")
            .or(config.context_class_name_prefix.as_ref())
        {
            options.context_class_name_prefix = prefix.clone();
        }
        if let Some(keyword) = &config.config_keyword {
            options.config_keyword = keyword.clone();
        }
        if let Some(keyword) = &config.component_keyword {
            options.component_keyword = keyword.clone();
        }
        if let Some(keyword) = &config.context_keyword {
            options.context_keyword = keyword.clone();
        }
        options.debug_mode = matches.get_flag("debug") || config.debug_mode.unwrap_or(false);
        options
    }

    pub fn output_directory(&self) -> Option<&str> {
        self.config.output_directory.as_deref()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
