//! poreroi command line front end.
//!
//! Talks to the analysis backend through the same workspace and driver the
//! interactive client uses.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::{Parser, Subcommand};
    use thiserror::Error;

    use poreroi::config::{AppConfig, ConfigError};
    use poreroi::driver::Driver;
    use poreroi::error::{RemoteError, ValidationError};
    use poreroi::remote::{AnalysisStore, HttpStore, RemoteCall, Reply};
    use poreroi::sync::{NoticeLevel, Workspace};

    /// Result type for CLI operations.
    type Result<T> = std::result::Result<T, CliError>;

    #[derive(Error, Debug)]
    enum CliError {
        #[error("Configuration error: {0}")]
        Config(#[from] ConfigError),

        #[error("Backend error: {0}")]
        Remote(#[from] RemoteError),

        #[error("{0}")]
        Rejected(#[from] ValidationError),

        #[error("{0}")]
        Failed(String),

        #[error("Failed to encode output: {0}")]
        Json(#[from] serde_json::Error),
    }

    /// Scale bar calibration and ROI measurement for microscopy images.
    #[derive(Parser)]
    #[command(name = "poreroi")]
    #[command(author, version, about, long_about = None)]
    struct Cli {
        /// Configuration file (defaults to the user config directory)
        #[arg(short, long, global = true)]
        config: Option<PathBuf>,

        /// Backend base URL, overriding the configuration
        #[arg(short, long, global = true)]
        server: Option<String>,

        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand)]
    enum Commands {
        /// List images known to the backend
        Images,

        /// Load an image's analysis and print per-ROI measurements
        Report {
            /// Image filename
            filename: String,

            /// Print JSON instead of a table
            #[arg(long)]
            json: bool,
        },

        /// Run scale bar detection without saving the result
        Detect {
            /// Image filename
            filename: String,
        },

        /// Delete all ROIs and the calibration of an image
        Delete {
            /// Image filename
            filename: String,
        },

        /// Print the effective configuration
        Config {
            /// Also write it to the configuration file
            #[arg(long)]
            write: bool,
        },
    }

    pub fn main() -> ExitCode {
        let cli = Cli::parse();

        let config = match load_config(cli.config.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        env_logger::Builder::from_env(
            env_logger::Env::default()
                .default_filter_or(config.preferences.log_level.to_level_filter().as_str()),
        )
        .init();

        match run(cli, config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
        match path {
            Some(path) => Ok(AppConfig::load_from(path)?),
            None => Ok(AppConfig::load_from_default_path().unwrap_or_default()),
        }
    }

    fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
        if let Some(server) = cli.server {
            config.server.base_url = server;
        }

        let store = HttpStore::new(config.server.base_url.clone(), config.server.timeout());
        let mut driver = Driver::new(store);
        let mut ws = Workspace::new(config.sync_settings(), config.viewport_settings());

        match cli.command {
            Commands::Images => list_images(&mut driver, &mut ws),
            Commands::Report { filename, json } => report(&mut driver, &mut ws, &filename, json),
            Commands::Detect { filename } => detect(&mut driver, &filename),
            Commands::Delete { filename } => delete(&mut driver, &mut ws, &filename),
            Commands::Config { write } => {
                println!("{}", config.to_json()?);
                if write {
                    match cli.config {
                        Some(path) => config.save_to(&path)?,
                        None => config.save_to_default_path()?,
                    }
                }
                Ok(())
            }
        }
    }

    /// Turn an error notice raised during the last pump into a failure.
    fn check_notice(ws: &Workspace) -> Result<()> {
        match ws.notice() {
            Some(notice) if notice.is_error() => Err(CliError::Failed(notice.text.clone())),
            Some(notice) if notice.level == NoticeLevel::Warning => {
                eprintln!("Warning: {}", notice.text);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn list_images(driver: &mut Driver<HttpStore>, ws: &mut Workspace) -> Result<()> {
        ws.refresh_images();
        driver.pump(ws);
        check_notice(ws)?;

        for image in ws.images() {
            let marker = if image.has_data { "*" } else { " " };
            println!("{} {}", marker, image.filename);
        }
        Ok(())
    }

    fn report(
        driver: &mut Driver<HttpStore>,
        ws: &mut Workspace,
        filename: &str,
        json: bool,
    ) -> Result<()> {
        ws.select_image(filename);
        driver.pump(ws);
        check_notice(ws)?;

        let summaries = ws.summaries();
        if json {
            let rows: Vec<serde_json::Value> = summaries
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id,
                        "version": s.version,
                        "areaPx2": s.area_px2,
                        "areaUm2": s.area_um2,
                        "equivalentSideUm": s.equivalent_side_um,
                        "nearestPx": s.nearest_px,
                        "nearestUm": s.nearest_um,
                        "notes": s.notes,
                    })
                })
                .collect();
            let out = serde_json::json!({
                "filename": filename,
                "pxPerUm": ws.px_per_um(),
                "scaleUm": ws.calibration().scale_um,
                "rois": rows,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        let calibration = ws.calibration();
        match calibration.scale_bar {
            Some(bar) => println!(
                "{}: scale bar {:.1} px = {} um ({:.4} px/um)",
                filename,
                bar.length(),
                calibration.scale_um,
                ws.px_per_um()
            ),
            None => println!("{}: no scale bar", filename),
        }

        if summaries.is_empty() {
            println!("No ROIs");
            return Ok(());
        }

        println!(
            "{:>4} {:>3} {:>12} {:>12} {:>10} {:>10}  notes",
            "id", "v", "area px2", "area um2", "side um", "nearest um"
        );
        for s in &summaries {
            println!(
                "{:>4} {:>3} {:>12.1} {:>12.3} {:>10} {:>10}  {}",
                s.id,
                s.version,
                s.area_px2,
                s.area_um2,
                format_optional(s.equivalent_side_um),
                format_optional(s.nearest_um),
                s.notes
            );
        }
        Ok(())
    }

    fn format_optional(value: Option<f64>) -> String {
        value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
    }

    fn detect(driver: &mut Driver<HttpStore>, filename: &str) -> Result<()> {
        let call = RemoteCall::DetectScaleBar {
            filename: filename.to_string(),
        };
        match driver.store_mut().execute(&call)? {
            Reply::ScaleBar(bar) => {
                println!(
                    "({:.1}, {:.1}) -> ({:.1}, {:.1}), {:.1} px",
                    bar.p1.x,
                    bar.p1.y,
                    bar.p2.x,
                    bar.p2.y,
                    bar.length()
                );
                Ok(())
            }
            other => Err(CliError::Failed(format!("Unexpected reply: {:?}", other))),
        }
    }

    fn delete(driver: &mut Driver<HttpStore>, ws: &mut Workspace, filename: &str) -> Result<()> {
        ws.select_image(filename);
        driver.pump(ws);
        ws.delete_analysis()?;
        driver.pump(ws);
        check_notice(ws)?;
        println!("Deleted analysis of {}", filename);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    cli::main()
}

// No command line on the web
#[cfg(target_arch = "wasm32")]
fn main() {}
