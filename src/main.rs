//! CLI front-end for the vascular tree generator.
//!
//! Mirrors the reference tool's flag set and console contract: a malformed
//! option value exits 1, a missing mandatory flag lists every flag that's
//! missing and exits 2, a map-construction failure prints `[paramfail]`,
//! and a completed run prints `[compsuccess]`.

use clap::Parser;
use std::process::ExitCode;
use vastree::config::AngleUnit;
use vastree::{Config, GrowthError, MapGeometry};

#[derive(Parser, Debug)]
#[command(name = "vastree", about = "Synthetic vascular tree generator")]
struct Cli {
    /// Root vessel radius.
    #[arg(long = "rr")]
    rr: Option<String>,
    /// Angle mode for --mr: d/degree or r/radian.
    #[arg(long = "am")]
    am: Option<String>,
    /// Output bounding box, "X Y Z".
    #[arg(long = "bb")]
    bb: Option<String>,
    /// Myocardium rotation, "X Y Z".
    #[arg(long = "mr")]
    mr: Option<String>,
    /// Myocardium wall thickness fraction.
    #[arg(long = "mt")]
    mt: Option<String>,
    /// Perfusion pressure.
    #[arg(long = "pp")]
    pp: Option<String>,
    /// Terminal pressure.
    #[arg(long = "tp")]
    tp: Option<String>,
    /// Perfusion flow.
    #[arg(long = "pf")]
    pf: Option<String>,
    /// Blood viscosity (rho).
    #[arg(long = "r")]
    r: Option<String>,
    /// Murray's law exponent (gamma).
    #[arg(long = "g")]
    g: Option<String>,
    /// Fitness length exponent (lambda).
    #[arg(long = "l")]
    l: Option<String>,
    /// Fitness radius exponent (mu).
    #[arg(long = "m")]
    m: Option<String>,
    /// Minimum inter-segment distance.
    #[arg(long = "md")]
    md: Option<String>,
    /// Target terminal node count.
    #[arg(long = "nn")]
    nn: Option<String>,
    /// Closest-neighbour count considered per candidate.
    #[arg(long = "cn")]
    cn: Option<String>,
    /// PRNG seed; non-positive picks a nondeterministic one.
    #[arg(long = "rs")]
    rs: Option<String>,
    /// Samples per spline sub-segment.
    #[arg(long = "ar")]
    ar: Option<String>,
    /// Output SWC path.
    #[arg(long = "op")]
    op: Option<String>,
    /// Optional JSON file overriding the internal voxel grid geometry
    /// (bounding box, perfusion point, centroid). Defaults to the
    /// reference tool's hardcoded values when omitted.
    #[arg(long = "map")]
    map: Option<String>,
}

struct Present {
    rr: String,
    am: String,
    bb: String,
    mr: String,
    mt: String,
    pp: String,
    tp: String,
    pf: String,
    r: String,
    g: String,
    l: String,
    m: String,
    md: String,
    nn: String,
    cn: String,
    rs: String,
    ar: String,
    op: String,
}

fn require_all(cli: Cli) -> Result<Present, Vec<String>> {
    let mut missing = Vec::new();
    macro_rules! need {
        ($field:ident, $flag:literal) => {
            match cli.$field {
                Some(v) => v,
                None => {
                    missing.push($flag.to_string());
                    String::new()
                }
            }
        };
    }
    let present = Present {
        rr: need!(rr, "--rr"),
        am: need!(am, "--am"),
        bb: need!(bb, "--bb"),
        mr: need!(mr, "--mr"),
        mt: need!(mt, "--mt"),
        pp: need!(pp, "--pp"),
        tp: need!(tp, "--tp"),
        pf: need!(pf, "--pf"),
        r: need!(r, "--r"),
        g: need!(g, "--g"),
        l: need!(l, "--l"),
        m: need!(m, "--m"),
        md: need!(md, "--md"),
        nn: need!(nn, "--nn"),
        cn: need!(cn, "--cn"),
        rs: need!(rs, "--rs"),
        ar: need!(ar, "--ar"),
        op: need!(op, "--op"),
    };
    if missing.is_empty() {
        Ok(present)
    } else {
        Err(missing)
    }
}

fn parse_f64(flag: &str, s: &str) -> Result<f64, GrowthError> {
    s.trim()
        .parse::<f64>()
        .map_err(|e| GrowthError::ParseFailure { flag: flag.to_string(), reason: e.to_string() })
}

fn parse_u32(flag: &str, s: &str) -> Result<u32, GrowthError> {
    s.trim()
        .parse::<u32>()
        .map_err(|e| GrowthError::ParseFailure { flag: flag.to_string(), reason: e.to_string() })
}

fn parse_i64(flag: &str, s: &str) -> Result<i64, GrowthError> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| GrowthError::ParseFailure { flag: flag.to_string(), reason: e.to_string() })
}

fn parse_triple(flag: &str, s: &str) -> Result<[f64; 3], GrowthError> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(GrowthError::ParseFailure {
            flag: flag.to_string(),
            reason: format!("expected 3 space-separated values, got {}", parts.len()),
        });
    }
    Ok([
        parse_f64(flag, parts[0])?,
        parse_f64(flag, parts[1])?,
        parse_f64(flag, parts[2])?,
    ])
}

fn parse_angle_unit(s: &str) -> Result<AngleUnit, GrowthError> {
    match s.trim().to_lowercase().as_str() {
        "d" | "degree" | "degrees" => Ok(AngleUnit::Degree),
        "r" | "radian" | "radians" => Ok(AngleUnit::Radian),
        other => Err(GrowthError::ParseFailure {
            flag: "--am".to_string(),
            reason: format!("unrecognized angle unit '{other}'"),
        }),
    }
}

fn build_config(present: Present, map_override: Option<&str>) -> Result<(Config, String), GrowthError> {
    let angle_unit = parse_angle_unit(&present.am)?;
    let mut rotation = parse_triple("--mr", &present.mr)?;
    if angle_unit == AngleUnit::Degree {
        for r in rotation.iter_mut() {
            *r = r.to_radians();
        }
    }

    let map = match map_override {
        Some(path) => MapGeometry::load(path)?,
        None => MapGeometry::default(),
    };

    let config = Config {
        root_radius: parse_f64("--rr", &present.rr)?,
        output_bounding_box: parse_triple("--bb", &present.bb)?,
        rotation,
        myocardium_thickness: parse_f64("--mt", &present.mt)?,
        perfusion_pressure: parse_f64("--pp", &present.pp)?,
        terminal_pressure: parse_f64("--tp", &present.tp)?,
        perfusion_flow: parse_f64("--pf", &present.pf)?,
        rho: parse_f64("--r", &present.r)?,
        gamma: parse_f64("--g", &present.g)?,
        lambda: parse_f64("--l", &present.l)?,
        mu: parse_f64("--m", &present.m)?,
        min_distance: parse_f64("--md", &present.md)?,
        target_nodes: parse_u32("--nn", &present.nn)?,
        closest_neighbours: parse_u32("--cn", &present.cn)?,
        random_seed: parse_i64("--rs", &present.rs)?,
        axial_refinement: parse_u32("--ar", &present.ar)?,
        map,
    };
    Ok((config, present.op))
}

fn run() -> Result<(), ExitCode> {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return Err(ExitCode::from(1));
        }
    };

    let map_override = cli.map.clone();
    let present = require_all(cli).map_err(|missing| {
        eprintln!("missing the following arguments: {}", missing.join(", "));
        ExitCode::from(2)
    })?;

    let (config, output_path) = build_config(present, map_override.as_deref()).map_err(|err| {
        eprintln!("{err}");
        ExitCode::from(1)
    })?;

    match vastree::grow(&config) {
        Ok(tree) => {
            let text = vastree::export_swc(&tree);
            if let Err(err) = std::fs::write(&output_path, text) {
                eprintln!("{}", GrowthError::EmissionFailure(err));
                return Err(ExitCode::from(1));
            }
            println!("[compsuccess]");
            Ok(())
        }
        Err(GrowthError::PerfusionOutsideVolume) => {
            println!("[paramfail]");
            Err(ExitCode::from(1))
        }
        Err(err) => {
            eprintln!("{err}");
            Err(ExitCode::from(1))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}
