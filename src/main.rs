use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, ErrorKind, Parser, Subcommand};

use scorecut::class_weight::{self, ClassWeight};
use scorecut::curve::{self, Curve};
use scorecut::threshold::{self, Detector, Labeler, PredictionStore};
use scorecut::util::format_score;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CurveKind {
    Raw,
    RunningMean,
    SavitzkyGolay,
    Polynomial,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum WeightMode {
    Uniform,
    Balanced,
    Auto,
}

impl From<WeightMode> for ClassWeight {
    fn from(mode: WeightMode) -> Self {
        match mode {
            WeightMode::Uniform => ClassWeight::Uniform,
            WeightMode::Balanced => ClassWeight::Balanced,
            WeightMode::Auto => ClassWeight::Auto,
        }
    }
}

#[derive(clap::Args, Debug)]
struct DetectorArgs {
    #[clap(
        long,
        value_enum,
        help = "Curve used to find the threshold. Defaults to running-mean for per-video detection and polynomial for pooled detection."
    )]
    curve: Option<CurveKind>,

    #[clap(
        long,
        value_parser = clap::value_parser!(usize),
        help = "Window size, in samples, for the running-mean and savitzky-golay curves. Defaults to 5 for running-mean and 21 for savitzky-golay."
    )]
    window: Option<usize>,

    #[clap(
        long,
        default_value_t = curve::DEFAULT_SAVITZKY_GOLAY_ORDER,
        value_parser = clap::value_parser!(usize),
        help = "Polynomial order for the savitzky-golay curve."
    )]
    order: usize,

    #[clap(
        long,
        default_value_t = curve::DEFAULT_POLYNOMIAL_DEGREE,
        value_parser = clap::value_parser!(usize),
        help = "Degree of the polynomial fitted by the polynomial curve."
    )]
    degree: usize,

    #[clap(
        long,
        value_parser = clap::value_parser!(f32),
        help = "The threshold is placed at the first sorted score where the second derivative of the curve exceeds this value. Defaults to 0.01 for per-video detection and 0.0 for pooled detection."
    )]
    second_derivative_threshold: Option<f32>,
}

impl DetectorArgs {
    fn curve(&self, pooled: bool) -> Curve {
        let kind = self.curve.unwrap_or(if pooled {
            CurveKind::Polynomial
        } else {
            CurveKind::RunningMean
        });
        match kind {
            CurveKind::Raw => Curve::Raw,
            CurveKind::RunningMean => Curve::RunningMean {
                window: self.window.unwrap_or(curve::DEFAULT_RUNNING_MEAN_WINDOW),
            },
            CurveKind::SavitzkyGolay => Curve::SavitzkyGolay {
                window: self.window.unwrap_or(curve::DEFAULT_SAVITZKY_GOLAY_WINDOW),
                order: self.order,
            },
            CurveKind::Polynomial => Curve::Polynomial {
                degree: self.degree,
            },
        }
    }

    fn detector(&self, pooled: bool) -> Detector {
        let default_threshold = if pooled {
            threshold::DEFAULT_POOLED_SECOND_DERIVATIVE_THRESHOLD
        } else {
            threshold::DEFAULT_SECOND_DERIVATIVE_THRESHOLD
        };
        Detector::default()
            .with_curve(self.curve(pooled))
            .with_second_derivative_threshold(
                self.second_derivative_threshold
                    .unwrap_or(default_threshold),
            )
    }

    fn validate(&self) {
        let mut cmd = Cli::command();
        if let Some(t) = self.second_derivative_threshold {
            if !t.is_finite() {
                cmd.error(
                    ErrorKind::InvalidValue,
                    "second_derivative_threshold must be a finite number",
                )
                .exit();
            }
        }
        if self.window == Some(0) {
            cmd.error(ErrorKind::InvalidValue, "window must be a positive number")
                .exit();
        }
        if let Curve::SavitzkyGolay { window, order } = self.curve(false) {
            if window % 2 != 1 {
                cmd.error(
                    ErrorKind::InvalidValue,
                    "window must be an odd number for the savitzky-golay curve",
                )
                .exit();
            }
            if window < order + 2 {
                cmd.error(
                    ErrorKind::InvalidValue,
                    "window must be at least order + 2 for the savitzky-golay curve",
                )
                .exit();
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(after_help = "Displays info about scorecut and its defaults.")]
    Info,

    #[clap(
        arg_required_else_help = true,
        after_help = "Derive decision thresholds from the prediction scores stored in a predictions file. By default, one threshold is computed per video. With --pooled, a single threshold is computed over the scores of all videos."
    )]
    Threshold {
        #[clap(
            required = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Predictions file (.json, or bincode for any other extension)."
        )]
        predictions: PathBuf,

        #[clap(
            long = "video",
            value_parser = clap::value_parser!(String),
            help = "Video to compute a threshold for. Can be repeated. Defaults to all videos in the predictions file."
        )]
        videos: Vec<String>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Compute a single threshold over the scores of all videos."
        )]
        pooled: bool,

        #[clap(flatten)]
        detector: DetectorArgs,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Store per-video thresholds in a thresholds file alongside the predictions file. Stored thresholds are reused by later runs with the same settings as long as the predictions file is unchanged."
        )]
        save: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Recompute all thresholds and ignore any stored in the thresholds file."
        )]
        force: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Process videos in parallel."
        )]
        threaded: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Do not display thresholds in stdout."
        )]
        no_display: bool,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Convert prediction scores into binary labels. A segment is labeled 1 if its score is at or above the threshold and 0 otherwise. The threshold is either given explicitly with --threshold, derived per video with --per-video, or derived once over all videos."
    )]
    Label {
        #[clap(
            required = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Predictions file (.json, or bincode for any other extension)."
        )]
        predictions: PathBuf,

        #[clap(
            long,
            value_parser = clap::value_parser!(f32),
            conflicts_with = "per_video",
            help = "Use this threshold for every segment instead of deriving one."
        )]
        threshold: Option<f32>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Derive a separate threshold for each video."
        )]
        per_video: bool,

        #[clap(flatten)]
        detector: DetectorArgs,

        #[clap(
            short,
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Write the labels to this file as JSON."
        )]
        output: Option<PathBuf>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Do not display labels in stdout."
        )]
        no_display: bool,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Compute per-class weights for an imbalanced set of integer labels."
    )]
    ClassWeights {
        #[clap(long, value_enum, default_value_t = WeightMode::Balanced, help = "Weighting scheme. 'balanced' uses n_samples / (n_classes * count), 'auto' uses the reciprocal class frequency normalized to sum to the number of classes.")]
        mode: WeightMode,

        #[clap(
            long,
            required = true,
            multiple_values = true,
            allow_hyphen_values = true,
            value_parser = clap::value_parser!(i64),
            help = "Classes to compute weights for."
        )]
        classes: Vec<i64>,

        #[clap(
            long,
            required = true,
            multiple_values = true,
            allow_hyphen_values = true,
            value_parser = clap::value_parser!(i64),
            help = "Observed labels."
        )]
        labels: Vec<i64>,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

impl Cli {
    fn validate(&self) {
        match &self.command {
            Commands::Info | Commands::ClassWeights { .. } => (),
            Commands::Threshold { detector, .. } => detector.validate(),
            Commands::Label {
                detector,
                threshold,
                ..
            } => {
                if let Some(t) = threshold {
                    if !t.is_finite() {
                        let mut cmd = Cli::command();
                        cmd.error(ErrorKind::InvalidValue, "threshold must be a finite number")
                            .exit();
                    }
                }
                detector.validate();
            }
        }
    }
}

fn main() -> scorecut::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let args = Cli::parse();
    args.validate();

    match args.command {
        Commands::Threshold {
            ref predictions,
            ref videos,
            pooled,
            ref detector,
            save,
            force,
            threaded,
            no_display,
        } => {
            if pooled {
                let store = PredictionStore::from_path(predictions)?;
                let t = detector.detector(true).detect_pooled(&store)?;
                if !no_display {
                    println!(
                        "all videos: {} (index {} of {})",
                        format_score(t.value),
                        t.index,
                        t.count
                    );
                }
            } else {
                let thresholds =
                    detector
                        .detector(false)
                        .run(predictions, videos, save, force, threaded)?;
                if !no_display {
                    for (video, t) in &thresholds {
                        println!(
                            "{}: {} (index {} of {})",
                            video,
                            format_score(t.value),
                            t.index,
                            t.count
                        );
                    }
                }
            }
        }
        Commands::Label {
            ref predictions,
            threshold,
            per_video,
            ref detector,
            ref output,
            no_display,
        } => {
            let store = PredictionStore::from_path(predictions)?;
            let labels = if let Some(t) = threshold {
                Labeler::new(t).label_all(&store)?
            } else if per_video {
                let thresholds = detector
                    .detector(false)
                    .run(predictions, &[], false, false, true)?;
                Labeler::label_with(&store, &thresholds)?
            } else {
                let t = detector.detector(true).detect_pooled(&store)?;
                tracing::info!("using pooled threshold {}", format_score(t.value));
                Labeler::new(t.value).label_all(&store)?
            };

            if !no_display {
                for label in &labels {
                    println!("{}", label);
                }
            }
            if let Some(output) = output {
                threshold::write_labels(&labels, output)?;
                tracing::info!("wrote {} labels to {}", labels.len(), output.display());
            }
        }
        Commands::ClassWeights {
            mode,
            ref classes,
            ref labels,
        } => {
            let weights = class_weight::compute_class_weight(mode.into(), classes, labels)?;
            for (class, weight) in classes.iter().zip(weights) {
                println!("{}: {:.6}", class, weight);
            }
        }
        Commands::Info => {
            println!("scorecut version: {}", env!("CARGO_PKG_VERSION"));
            let detectors = [("per-video", Detector::default()), ("pooled", Detector::pooled())];
            for (kind, detector) in detectors {
                println!(
                    "{} detection: curve={} second_derivative_threshold={}",
                    kind,
                    detector.curve(),
                    detector.second_derivative_threshold()
                );
            }
        }
    }

    Ok(())
}
