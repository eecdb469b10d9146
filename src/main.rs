use adaptive_volume::app::{self, ExitCode};
use adaptive_volume::audio;
use adaptive_volume::config::{self, Args, Commands, SettingsAction};
use adaptive_volume::constants::settings::DEFAULT_DOMAIN;
use adaptive_volume::domain::resolve_domain;
use adaptive_volume::logging;
use adaptive_volume::settings::{PartialConfiguration, SettingsService};
use clap::Parser;
use dialoguer::{Select, theme::ColorfulTheme};

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let device_list = audio::input_device_names()?;

    if device_list.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    // Interactive selection
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select an audio input device")
        .items(&device_list)
        .default(0)
        .interact()?;

    println!("{}", device_list[selection]);

    Ok(())
}

fn domain_for(url: Option<&str>) -> String {
    url.map(resolve_domain)
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
}

async fn settings_command(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SettingsAction::Show(target) => {
            let store = config::open_store(target.settings)?;
            let service = SettingsService::new(store, domain_for(target.url.as_deref()), None);
            println!("{}: {}", service.domain(), serde_json::to_string(&service.load())?);
        }
        SettingsAction::Set(set_args) => {
            let update = config::partial_from_set_args(&set_args)?;
            let store = config::open_store(set_args.target.settings)?;
            let service =
                SettingsService::new(store, domain_for(set_args.target.url.as_deref()), None);

            let current = PartialConfiguration::from(service.load());
            service.save(&current.overlay(&update)).await;
            println!("{}: {}", service.domain(), serde_json::to_string(&service.load())?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_level) {
        eprintln!("{}", e);
        std::process::exit(ExitCode::Error as i32);
    }

    match args.command {
        Commands::Run(run_args) => {
            let config = match config::RunConfig::from_run_args(run_args) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            };

            let run_result = app::App::new_with_config(config).run().await;
            match run_result.result {
                Ok(_) => {
                    std::process::exit(run_result.exit_code as i32);
                }
                Err(e) => {
                    eprintln!("Application error: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::List(_) => {
            if let Err(e) = list_devices() {
                eprintln!("Error listing devices: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
        Commands::Measure(measure_args) => {
            let config = match config::MeasureConfig::from_measure_args(&measure_args) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            };

            match app::measure(config).await {
                Ok(m) => {
                    let gain = m.gain.map(|g| g.value());
                    if measure_args.quiet {
                        println!("{:.1}", m.average_db);
                        println!("{:.2}", gain.unwrap_or(1.0));
                    } else {
                        println!("Domain: {} (enabled: {}, sensitivity: {:.1})", m.domain, m.config.enabled, m.config.sensitivity);
                        println!("Average ambient level: {:.1} dBFS", m.average_db);
                        println!("Peak ambient level: {:.1} dBFS", m.max_db);
                        println!("Smoothed ambient level: {:.1} dBFS", m.smoothed_db);
                        match gain {
                            Some(g) => println!("Target gain: {:.2}x", g),
                            None => println!("Target gain: unchanged (no signal)"),
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error during measurement: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::Settings(settings_args) => {
            if let Err(e) = settings_command(settings_args.action).await {
                eprintln!("Settings error: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
    }
}
