use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use framegate_core::{
    CalibrationMetrics, EngineConfig, FrameGovernanceEngine, GateName, GateRequest,
    GovernanceMode, Ontology, PolicyOverlay, UncertaintyDecomposition,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// FrameGate - frame validation and adaptive governance for agent delegation
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (TOML); defaults apply when omitted
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Symbol ontology (TOML); the built-in table is used when omitted
    #[arg(long, value_name = "FILE", global = true)]
    ontology: Option<PathBuf>,

    /// Policy overlay (TOML or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    overlay: Option<PathBuf>,
}

/// Uncertainty and calibration inputs shared by governance commands
#[derive(clap::Args)]
struct GovernanceArgs {
    /// Governance mode (flexible, standard, strict, forbidden)
    #[arg(long, conflicts_with = "frame")]
    mode: Option<String>,

    /// Derive the mode from a frame instead
    #[arg(long)]
    frame: Option<String>,

    /// Epistemic uncertainty
    #[arg(long, default_value_t = 0.0)]
    epistemic: f64,

    /// Aleatoric uncertainty
    #[arg(long, default_value_t = 0.0)]
    aleatoric: f64,

    /// Expected calibration error
    #[arg(long, default_value_t = 0.0)]
    ece: f64,

    /// Action vocabulary size, enables the review auto-pass floor
    #[arg(long)]
    vocabulary: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a frame and print its symbols
    Parse { frame: String },

    /// Resolve a frame against the ontology and overlay
    Resolve {
        frame: String,

        /// Check whether this tool may be invoked under the frame
        #[arg(long)]
        tool: Option<String>,
    },

    /// Validate a frame, or a delegation chain root first
    Validate {
        #[arg(required = true)]
        frames: Vec<String>,

        /// Parent frame for a single-frame chain check
        #[arg(long)]
        parent: Option<String>,
    },

    /// Compute effective thresholds for every gate
    Thresholds {
        #[command(flatten)]
        governance: GovernanceArgs,
    },

    /// Decide one gate
    Gate {
        /// Gate name, e.g. drift_threshold
        gate: String,

        /// Observed value
        observed: f64,

        #[command(flatten)]
        governance: GovernanceArgs,

        /// Content to scan for sensitive data
        #[arg(long)]
        content: Option<String>,

        /// Conflict coefficient
        #[arg(long, default_value_t = 0.0)]
        conflict: f64,
    },

    /// Validate a configuration file and print it with defaults filled in
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Commands::CheckConfig = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let engine = build_engine(&cli, config)?;
    tracing::debug!(symbols = engine.ontology().len(), "engine ready");

    match cli.command {
        Commands::Parse { frame } => match engine.parse(&frame) {
            Some(parsed) => print_json(&parsed)?,
            None => bail!("no recognized symbols in {frame:?}"),
        },
        Commands::Resolve { frame, tool } => {
            let Some(resolved) = engine.resolve(&frame) else {
                bail!("no recognized symbols in {frame:?}");
            };
            match tool {
                Some(tool) => print_json(&serde_json::json!({
                    "tool": tool,
                    "allowed": resolved.is_tool_allowed(&tool),
                }))?,
                None => print_json(&resolved)?,
            }
        }
        Commands::Validate { frames, parent } => {
            let reports = match (frames.as_slice(), parent) {
                ([single], parent) => vec![engine.validate(single, parent.as_deref())],
                (_, Some(_)) => bail!("--parent applies to a single frame; list the chain instead"),
                (chain, None) => {
                    let chain: Vec<&str> = chain.iter().map(String::as_str).collect();
                    engine.validate_chain(&chain)
                }
            };
            print_json(&reports)?;
            if reports.iter().any(|r| !r.valid) {
                std::process::exit(1);
            }
        }
        Commands::Thresholds { governance } => {
            let mode = governance_mode(&engine, &governance)?;
            let thresholds = engine.compute_thresholds(
                mode,
                &uncertainty(&governance),
                &CalibrationMetrics::from_ece(governance.ece),
                governance.vocabulary,
            );
            print_json(&thresholds)?;
        }
        Commands::Gate {
            gate,
            observed,
            governance,
            content,
            conflict,
        } => {
            let Some(gate) = GateName::parse(&gate) else {
                bail!(
                    "unknown gate {gate:?}; expected one of {}",
                    GateName::ALL.map(|g| g.as_str()).join(", ")
                );
            };
            let mode = governance_mode(&engine, &governance)?;
            let mut request = GateRequest::new(gate, observed, mode)
                .with_uncertainty(uncertainty(&governance))
                .with_calibration(CalibrationMetrics::from_ece(governance.ece))
                .with_conflict(conflict);
            if let Some(size) = governance.vocabulary {
                request = request.with_vocabulary_size(size);
            }
            if let Some(content) = content {
                request = request.with_content(content);
            }
            print_json(&engine.evaluate_gate(&request))?;
        }
        Commands::CheckConfig => {}
    }

    Ok(())
}

fn build_engine(cli: &Cli, config: EngineConfig) -> anyhow::Result<FrameGovernanceEngine> {
    let mut builder = FrameGovernanceEngine::builder(config);
    if let Some(path) = &cli.ontology {
        let ontology = Ontology::from_file(path)?;
        builder = builder.ontology(Arc::new(ontology));
    }
    if let Some(path) = &cli.overlay {
        let overlay = PolicyOverlay::from_file(path)?;
        builder = builder.overlay(Arc::new(overlay));
    }
    Ok(builder.build()?)
}

fn governance_mode(engine: &FrameGovernanceEngine, args: &GovernanceArgs) -> anyhow::Result<GovernanceMode> {
    if let Some(frame) = &args.frame {
        return engine
            .governance_mode(frame)
            .with_context(|| format!("no recognized symbols in {frame:?}"));
    }
    match &args.mode {
        Some(mode) => GovernanceMode::parse(mode).with_context(|| format!("unknown mode {mode:?}")),
        None => Ok(GovernanceMode::Standard),
    }
}

fn uncertainty(args: &GovernanceArgs) -> UncertaintyDecomposition {
    UncertaintyDecomposition::new(args.epistemic, args.aleatoric, "cli")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_gate_command() {
        let cli = Cli::try_parse_from([
            "framegate",
            "gate",
            "drift_threshold",
            "0.2",
            "--mode",
            "strict",
            "--epistemic",
            "0.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Gate { gate, observed, governance, .. } => {
                assert_eq!(gate, "drift_threshold");
                assert_eq!(observed, 0.2);
                assert_eq!(governance.mode.as_deref(), Some("strict"));
            }
            _ => panic!("expected gate command"),
        }
    }

    #[test]
    fn test_mode_from_frame() {
        let engine = FrameGovernanceEngine::new(EngineConfig::default()).unwrap();
        let cli = Cli::try_parse_from(["framegate", "thresholds", "--frame", "⊗◊▷α"]).unwrap();
        let Commands::Thresholds { governance } = cli.command else {
            panic!("expected thresholds command");
        };
        assert_eq!(
            governance_mode(&engine, &governance).unwrap(),
            GovernanceMode::Forbidden
        );
    }
}
