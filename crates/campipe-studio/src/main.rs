use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;

use campipe_engine::config::PipelineConfig;
use campipe_engine::logging::{LoggingConfig, init_logging};
use campipe_engine::platform::{HeadlessPlatform, Platform};
use campipe_engine::render::DebugChecks;
use campipe_engine::runloop::{self, ExitFlag, LoopConfig};

mod studio;
mod tcp;

use studio::Studio;
use tcp::TcpSink;

/// Runs the camera pipeline headless: feed, lens correction, compositing and
/// optional frame export.
#[derive(Parser, Debug)]
#[command(name = "campipe-studio", version)]
struct Cli {
    /// Pipeline config (TOML). Defaults are used without one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Displacement mesh file; overrides the lens model.
    #[arg(long)]
    ldc: Option<PathBuf>,

    /// Show this image instead of the camera.
    #[arg(long)]
    static_texture: Option<PathBuf>,

    /// Send composited frames to `host:port`.
    #[arg(long, value_name = "ADDR")]
    export: Option<String>,

    /// Log filter, e.g. "debug" or "campipe_engine=trace".
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    k0: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    k1: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    k2: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    k3: Option<f32>,

    /// Lens mesh grid points per axis.
    #[arg(long)]
    mesh_points: Option<u32>,
}

impl Cli {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(ldc) = &self.ldc {
            config.ldc_file = Some(ldc.clone());
        }
        if let Some(tex) = &self.static_texture {
            config.texture = Some(tex.clone());
        }

        let ks = [self.k0, self.k1, self.k2, self.k3];
        if ks.iter().any(Option::is_some) || self.mesh_points.is_some() {
            let lens = config.lens.get_or_insert_with(Default::default);
            for (k, v) in lens.k.iter_mut().zip(ks) {
                if let Some(v) = v {
                    *k = v;
                }
            }
            if let Some(n) = self.mesh_points {
                lens.mesh_points = n;
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LoggingConfig { env_filter: cli.log.clone(), ..LoggingConfig::default() });

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("campipe-studio: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    cli.apply(&mut config);
    log::debug!("{config:#?}");

    let exit = ExitFlag::new();
    let on_sigint = exit.clone();
    ctrlc::set_handler(move || on_sigint.request()).context("failed to install SIGINT handler")?;

    let sink = cli
        .export
        .as_deref()
        .map(|addr| TcpSink::connect(addr).with_context(|| format!("failed to connect to {addr}")))
        .transpose()?;

    let mut platform = HeadlessPlatform::new(config.screen.width, config.screen.height)?;
    let checks = DebugChecks::default();
    let mut studio = Studio::build(&platform.render_ctx(checks), &config, sink)?;

    let loop_config = LoopConfig { max_frames: cli.frames, checks, ..Default::default() };
    let result = runloop::run(&mut platform, &exit, &loop_config, |f| studio.frame(f));

    if let Some(stats) = studio.teardown(&platform.render_ctx(checks)) {
        log::info!("export: {} sent, {} dropped, {} failed", stats.sent, stats.dropped, stats.failed);
    }

    let stats = result.context("render loop failed")?;
    log::info!("{} frames presented, {} skipped", stats.frames, stats.skipped);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lens_flags_override_config() {
        let cli = Cli::parse_from(["campipe-studio", "--k1", "-0.5", "--mesh-points", "16"]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);

        let lens = config.lens.unwrap();
        assert_eq!(lens.k, [5.12, -0.5, 0.0, 1.0]);
        assert_eq!(lens.mesh_points, 16);
    }

    #[test]
    fn no_lens_flags_keep_config_untouched() {
        let cli = Cli::parse_from(["campipe-studio", "--frames", "10", "--ldc", "mesh.txt"]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.lens, None);
        assert_eq!(config.ldc_file, Some(PathBuf::from("mesh.txt")));
        assert_eq!(cli.frames, Some(10));
    }

    #[test]
    fn headless_run_with_static_texture() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("tex.ppm");
        std::fs::write(&tex, b"P6\n2 2\n255\n\xff\x00\x00\x00\xff\x00\x00\x00\xff\x10\x10\x10").unwrap();

        let cli = Cli::parse_from([
            "campipe-studio",
            "--frames",
            "3",
            "--static-texture",
            tex.to_str().unwrap(),
        ]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);

        let mut platform = HeadlessPlatform::new(64, 48).unwrap();
        let checks = DebugChecks::off();
        let mut studio = Studio::build(&platform.render_ctx(checks), &config, None).unwrap();
        let loop_config = LoopConfig { max_frames: cli.frames, checks, ..Default::default() };
        let stats = runloop::run(&mut platform, &ExitFlag::new(), &loop_config, |f| studio.frame(f)).unwrap();
        assert!(studio.teardown(&platform.render_ctx(checks)).is_none());

        assert_eq!(stats.frames, 3);
        assert_eq!(platform.headless().live_objects().textures, 0);
    }
}
