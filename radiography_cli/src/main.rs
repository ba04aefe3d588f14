use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libradiography::config::Config;
use libradiography::merge_status::MergePhase;
use libradiography::process::{process_cnr, process_heatmap, process_merge};

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

fn phase_message(phase: MergePhase) -> &'static str {
    match phase {
        MergePhase::Reading => "Reading files",
        MergePhase::Writing => "Writing tables",
    }
}

fn run_merge(config: Config, pb_manager: &MultiProgress) {
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    log::info!("Starts With: {}", config.starts_with);
    log::info!("Output Name: {}", config.output_name);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{msg:>15} [{bar:40.cyan/blue}] {pos:>3}%") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(phase_message(MergePhase::Reading));
    let (tx, rx) = mpsc::channel();
    // Spawn the task!
    let handle = std::thread::spawn(move || process_merge(&config, &tx));

    loop {
        std::thread::sleep(std::time::Duration::from_millis(100));
        while let Ok(status) = rx.try_recv() {
            pb.set_message(phase_message(status.phase));
            pb.set_position((status.progress * 100.0) as u64);
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(summary) => log::info!(
                        "Successfully merged data into {}!",
                        summary.output_path.display()
                    ),
                    Err(e) => log::error!("Merging failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join merging task!"),
            }
            break;
        }
    }

    pb.finish();
}

fn main() {
    // Create a cli
    let matches = Command::new("radiography_cli")
        .about("Merge radiography simulation output, build heatmaps, and measure CNR")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("merge").about("Merge the simulation output files"))
        .subcommand(Command::new("heatmap").about("Build a heatmap from a merged file"))
        .subcommand(Command::new("cnr").about("Measure the contrast-to-noise ratio of an image"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .is_err()
    {
        eprintln!("Could not create logging/progress!");
        return;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");

    match matches.subcommand() {
        Some(("merge", _)) => run_merge(config, &pb_manager),
        Some(("heatmap", _)) => match process_heatmap(&config) {
            Ok(heatmap) => log::info!(
                "Heatmap built: {} x {} pixels",
                heatmap.rows(),
                heatmap.cols()
            ),
            Err(e) => log::error!("Heatmap failed with error: {e}"),
        },
        Some(("cnr", _)) => {
            if let Err(e) = process_cnr(&config) {
                log::error!("CNR failed with error: {e}");
            }
        }
        _ => log::error!("No subcommand given; use one of new, merge, heatmap, cnr"),
    }

    log::info!("Done.");
}
