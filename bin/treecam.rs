use clap::Parser;
use std::fs;
use std::path::PathBuf;
use treecam::config::{load_and_merge_configs, CliOverrides};
use treecam::model::EnsembleModel;
use treecam::utils::log::init_log;
use treecam::utils::report::print_compile_report;

/// treecam - compile a tree ensemble onto a CAM accelerator
#[derive(Parser, Debug)]
#[command(name = "treecam")]
#[command(version = "0.1.0")]
#[command(about = "Maps decision-tree ensembles onto analog CAM tiles", long_about = None)]
struct Args {
  /// Ensemble model file (JSON leaf table and samples)
  #[arg(short, long, value_name = "FILE")]
  model: PathBuf,

  /// Hardware/software description merged over the defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Where to write the compiled system (JSON); stdout, without the report, if absent
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Seed for threshold noise
  #[arg(long)]
  seed: Option<u64>,

  /// Probability of each +/-1 move of a quantized threshold index
  #[arg(long, value_name = "P")]
  noise_p: Option<f64>,

  /// Output directory handed to the simulated devices
  #[arg(long, value_name = "DIR")]
  log_dir: Option<String>,

  /// Quiet mode (suppress log messages and the report)
  #[arg(short, long)]
  quiet: bool,
}

fn main() -> std::io::Result<()> {
  let args = Args::parse();
  init_log(args.quiet);

  let overrides = CliOverrides {
    seed: args.seed,
    noise_p: args.noise_p,
    log_dir: args.log_dir,
  };
  let config = load_and_merge_configs(args.config.as_deref(), &overrides).map_err(std::io::Error::other)?;
  let model = EnsembleModel::from_json_file(&args.model).map_err(std::io::Error::other)?;

  let compiled = treecam::compile(&config, &model).map_err(std::io::Error::other)?;
  let json = compiled.to_json().map_err(std::io::Error::other)?;
  match args.output {
    Some(path) => {
      fs::write(&path, json)?;
      log::info!("wrote {}", path.display());
      print_compile_report(&compiled);
    },
    // stdout carries only the JSON
    None => println!("{}", json),
  }
  Ok(())
}
