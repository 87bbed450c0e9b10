use mqtt_gas_meter::daemon::Daemon;

use mqtt_gas_meter::configuration;

const DEFAULT_CONFIG_PATH: &str = "/etc/mqtt-gas-meter.conf";

/// Parses the command line: an optional config file path and the remove flag
///
/// Unknown options are rejected instead of being taken for a config path.
fn parse_args(args: &[String]) -> Result<(String, bool), String> {
    let mut config_path = String::from(DEFAULT_CONFIG_PATH);
    let mut remove = false;
    for arg in args {
        match arg.as_str() {
            "-r" | "--remove" => remove = true,
            flag if flag.starts_with('-') => return Err(format!("Unknown option {flag}")),
            path => config_path = path.to_string(),
        }
    }
    Ok((config_path, remove))
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (config_path, remove) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Usage: mqtt-gas-meter [config-file] [-r|--remove]");
            std::process::exit(2);
        }
    };

    let config =
        configuration::Configuration::load(&config_path).expect("Failed to load configuration");

    stderrlog::new()
        .module(module_path!())
        .verbosity(config.log_verbosity)
        .init()
        .expect("Failed to initialize logging");

    let mut daemon = Daemon::new(config).expect("Failed to create daemon");

    if remove {
        daemon.remove().await;
    } else {
        daemon.run().await;
    }
}
