mod daemon;
mod paths;
mod settings;

use owo_colors::OwoColorize;

fn main() {
	let args: Vec<String> = std::env::args().skip(1).collect();

	match args.first().map(|s| s.as_str()) {
		None | Some("serve") => cmd_serve(),
		Some("help" | "--help" | "-h") => print_usage(),
		Some("version" | "--version" | "-V") => println!("nanoctl {}", env!("CARGO_PKG_VERSION")),
		Some(other) => {
			eprintln!("unknown command: {}", other);
			eprintln!("run 'nanoctl help' for usage");
			std::process::exit(1);
		}
	}
}

fn cmd_serve() {
	let runtime = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("error: failed to start runtime: {}", e);
			std::process::exit(1);
		}
	};
	if let Err(e) = runtime.block_on(daemon::run()) {
		eprintln!("{} {}", "error:".red().bold(), e);
		std::process::exit(1);
	}
}

fn print_usage() {
	eprintln!("{} {} - control plane for a nanobot gateway", "nanoctl".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} [command]", "nanoctl".bold());
	eprintln!();

	eprintln!("{}", "commands".cyan().bold());
	eprintln!("  {}        Run the HTTP control plane (default)", "serve".bold());
	eprintln!("  {}      Print version", "version".bold());
	eprintln!("  {}         Show this help", "help".bold());
	eprintln!();

	eprintln!("{}", "settings".cyan().bold());
	eprintln!("  {}", paths::settings_path().display());
	eprintln!("  {}  overrides the settings file path", "NANOCTL_CONFIG".bold());
	eprintln!("  {}            listen port (default 8080)", "PORT".bold());
	eprintln!("  {}  / {}  basic auth credentials", "ADMIN_USERNAME".bold(), "ADMIN_PASSWORD".bold());
}
