//! Headless driver for the diarch emulator core.
//!
//! This binary is a thin host: it loads boot images (directly, or via a
//! settings file), constructs a [`Core`], and drives `run_frame()` in a
//! loop. It performs:
//! 1. **Direct run:** boot image paths given on the command line.
//! 2. **Settings run:** boot image paths read from a `name=value`
//!    settings file.
//! 3. **Script run:** a Python script (via `crates/bindings`) drives the
//!    core frame-by-frame — the same mechanism a regression harness
//!    would use to script key presses across frames.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use pyo3::prelude::*;
use pyo3::types::PyList;
use std::ffi::CString;

use diarch_core::config::{Config, Settings};
use diarch_core::sim::{BootImages, Core};

#[derive(Parser, Debug)]
#[command(
    name = "diarch",
    author,
    version,
    about = "Cycle-scheduled emulator core for a dual-CPU-island handheld console",
    long_about = "Run a set of boot images directly or via a settings file, or run a Python script that drives the core frame-by-frame.\n\nExamples:\n  diarch run --boot11 boot11.bin --boot9 boot9.bin\n  diarch run --settings settings.ini --frames 600 --out last.ppm\n  diarch script scripts/smoke_test.py"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot a core and run it for a fixed number of frames.
    Run {
        /// ARM11 boot ROM path.
        #[arg(long)]
        boot11: Option<String>,

        /// ARM9 boot ROM path.
        #[arg(long)]
        boot9: Option<String>,

        /// Optional NAND image.
        #[arg(long)]
        nand: Option<String>,

        /// Optional SD card image.
        #[arg(long)]
        sd: Option<String>,

        /// Settings file (`name=value` lines) to read boot paths from
        /// instead of the flags above.
        #[arg(long)]
        settings: Option<String>,

        /// Number of display frames to run.
        #[arg(long, default_value_t = 60)]
        frames: u64,

        /// Write the last completed frame to this path as a raw PPM.
        #[arg(long)]
        out: Option<String>,
    },

    /// Run a Python script with `diarch_emulator` injected. Script gets
    /// argv as `sys.argv`. Use this to script frame-by-frame input for
    /// a regression or compatibility run.
    Script {
        /// Script path.
        path: String,

        /// Arguments for the script (`sys.argv[1:]`).
        #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { boot11, boot9, nand, sd, settings, frames, out }) => {
            cmd_run(boot11, boot9, nand, sd, settings, frames, out);
        }
        Some(Commands::Script { path, args }) => run_python_script(&path, args),
        None => {
            eprintln!("diarch — pass a subcommand");
            eprintln!();
            eprintln!("  diarch run --boot11 <rom> --boot9 <rom>   Boot and run");
            eprintln!("  diarch run --settings <file>              Boot from a settings file");
            eprintln!("  diarch script <script.py> [args...]       Script frame-by-frame input");
            eprintln!();
            eprintln!("  diarch --help  for full options");
            process::exit(1);
        }
    }
}

/// Resolves boot image paths from either explicit flags or a settings
/// file, preferring explicit flags when both are given.
fn resolve_images(
    boot11: Option<String>,
    boot9: Option<String>,
    nand: Option<String>,
    sd: Option<String>,
    settings_path: Option<String>,
) -> BootImages {
    let settings = settings_path.map(|path| {
        let contents = fs::read_to_string(&path).unwrap_or_else(|e| {
            eprintln!("Error reading settings file {path}: {e}");
            process::exit(1);
        });
        Settings::parse(&contents)
    });

    let from_settings_or_flag = |flag: Option<String>, pick: fn(&Settings) -> Option<PathBuf>| {
        flag.map(PathBuf::from).or_else(|| settings.as_ref().and_then(pick))
    };

    BootImages {
        boot11: from_settings_or_flag(boot11, |s| s.boot11_path.clone()).unwrap_or_else(|| {
            eprintln!("Error: no ARM11 boot ROM given (--boot11 or boot11Path= in --settings)");
            process::exit(1);
        }),
        boot9: from_settings_or_flag(boot9, |s| s.boot9_path.clone()).unwrap_or_else(|| {
            eprintln!("Error: no ARM9 boot ROM given (--boot9 or boot9Path= in --settings)");
            process::exit(1);
        }),
        nand: from_settings_or_flag(nand, |s| s.nand_path.clone()),
        sd: from_settings_or_flag(sd, |s| s.sd_path.clone()),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    boot11: Option<String>,
    boot9: Option<String>,
    nand: Option<String>,
    sd: Option<String>,
    settings: Option<String>,
    frames: u64,
    out: Option<String>,
) {
    let images = resolve_images(boot11, boot9, nand, sd, settings);
    tracing::info!(boot11 = %images.boot11.display(), boot9 = %images.boot9.display(), "booting core");

    let mut core = Core::new(&images, Config::default()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    for _ in 0..frames {
        core.run_frame();
    }

    println!(
        "ran {frames} frames: {} opcodes ({:.1}M/s), {} GPU commands, {} vertices, {} triangles",
        core.stats.total_opcodes(),
        core.stats.opcodes_per_sec() / 1_000_000.0,
        core.stats.gpu_commands_processed,
        core.stats.vertices_shaded,
        core.stats.triangles_rasterized,
    );

    if let Some(path) = out {
        if let Some(frame) = core.get_frame() {
            write_ppm(&path, frame.width, frame.height, &frame.pixels).unwrap_or_else(|e| {
                eprintln!("Error writing frame to {path}: {e}");
                process::exit(1);
            });
        } else {
            eprintln!("Warning: no frame was ready to write to {path}");
        }
    }
}

/// Writes an RGBA8 buffer out as a binary PPM (dropping alpha), good
/// enough for a smoke test to eyeball without a full image crate.
fn write_ppm(path: &str, width: usize, height: usize, rgba: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let mut out = fs::File::create(path)?;
    write!(out, "P6\n{width} {height}\n255\n")?;
    let mut rgb = Vec::with_capacity(width * height * 3);
    for pixel in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }
    out.write_all(&rgb)
}

/// Runs a Python script with `diarch_emulator` injected into
/// `sys.modules` and `sys.argv` set, mirroring how a regression harness
/// would script key presses and frame stepping via `crates/bindings`.
fn run_python_script(script_path: &str, script_args: Vec<String>) {
    let script_content = fs::read_to_string(script_path).unwrap_or_else(|e| {
        eprintln!("Error reading script {script_path}: {e}");
        process::exit(1);
    });

    Python::with_gil(|py| {
        let sys = py.import("sys").expect("sys");
        let path = sys.getattr("path").expect("path");
        path.call_method1("append", (".",)).expect("path.append");

        let m = PyModule::new(py, "diarch_emulator").expect("module");
        diarch_bindings::register_emulator_module(&m).expect("register");
        let modules = sys.getattr("modules").expect("modules");
        modules.set_item("diarch_emulator", m).expect("inject");

        let mut full_args = vec![script_path.to_string()];
        full_args.extend(script_args);
        let py_args = PyList::new(py, &full_args).expect("argv");
        sys.setattr("argv", py_args).expect("argv");

        let code_c = CString::new(script_content).expect("code");
        let file_c = CString::new(script_path).expect("file");
        let name_c = CString::new("__main__").unwrap();

        let result = PyModule::from_code(py, &code_c, &file_c, &name_c);
        if let Err(e) = result {
            e.print(py);
            process::exit(1);
        }
    });
}
