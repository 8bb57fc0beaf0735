use std::io::Read;

use clap::Parser;

use vosh::kernel::{Kernel, KernelOptions};

#[derive(Parser)]
#[command(name = "vosh")]
#[command(about = "An in-process UNIX-like runtime: virtual filesystem and shell")]
#[command(version)]
struct Cli {
    /// Execute the script from a command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Hostname visible inside the runtime
    #[arg(long = "hostname", default_value = "vosh")]
    hostname: String,

    /// Content-store budget in MiB (0 = unbounded)
    #[arg(long = "store-budget", default_value_t = 256)]
    store_budget: u64,

    /// Script file on the host to execute
    #[arg()]
    script_file: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Script source: -c, a host file, or piped stdin.
    let script = if let Some(script) = cli.script {
        script
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("vosh: cannot read script file {}: {}", file, e);
                std::process::exit(1);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!("vosh: no script provided; use -c 'script', a script file, or pipe via stdin");
            std::process::exit(1);
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).unwrap_or_default();
        buf
    };

    if script.trim().is_empty() {
        std::process::exit(0);
    }

    let kernel = Kernel::boot(KernelOptions {
        hostname: cli.hostname,
        store_budget: if cli.store_budget == 0 {
            None
        } else {
            Some(cli.store_budget * 1024 * 1024)
        },
        ..Default::default()
    })
    .await;

    let (code, stdout, stderr) = kernel.run_script(&script).await;
    if !stdout.is_empty() {
        print!("{}", stdout);
    }
    if !stderr.is_empty() {
        eprint!("{}", stderr);
    }
    std::process::exit(code);
}
