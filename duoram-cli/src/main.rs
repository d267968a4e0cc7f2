//! Command-line surface for the DUORAM cluster and its control channel.
//!
//! One subcommand per component:
//!
//! ```bash
//! duoram pairing-server --listen 0.0.0.0:9300
//! duoram party --role A --rows 8 --listen 0.0.0.0:9700 --peer-listen 0.0.0.0:9701 \
//!              --peer 127.0.0.1:9801 --share 127.0.0.1:9300
//! duoram coordinator --op write --dim 8 --idx 3 --val 42 \
//!                    --c0 127.0.0.1:9700 --c1 127.0.0.1:9800
//! duoram control-server --listen 127.0.0.1:5000
//! duoram control-client --server 127.0.0.1:5000 --username alice
//! ```

use std::io::{self, BufRead, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use duoram::{Coordinator, PairingServer, PartyConfig, PartyNode, Ring31, Role};
use rotating_key::{ControlClient, ControlServer, UserDb};

#[derive(Parser)]
#[command(name = "duoram", version, about = "Two-server oblivious RAM with an authenticated control channel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// serves Du-Atallah correlated randomness to party pairs.
    PairingServer {
        #[arg(long, default_value = "0.0.0.0:9300")]
        listen: String,
    },
    /// runs one of the two database parties.
    Party {
        /// Party role, A or B.
        #[arg(long)]
        role: String,
        /// Number of database rows.
        #[arg(long)]
        rows: u32,
        /// Client-facing listen address.
        #[arg(long, default_value = "0.0.0.0:9700")]
        listen: String,
        /// Listen port (or address) for inbound peer residuals.
        #[arg(long, default_value = "9701")]
        peer_listen: String,
        /// The peer party's residual listener.
        #[arg(long, default_value = "127.0.0.1:9801")]
        peer: String,
        /// The pairing server.
        #[arg(long, default_value = "127.0.0.1:9300")]
        share: String,
    },
    /// splits one logical request across both parties.
    Coordinator {
        /// "read" or "write".
        #[arg(long)]
        op: String,
        #[arg(long)]
        dim: u32,
        #[arg(long)]
        idx: u32,
        /// Value to add; only used by writes.
        #[arg(long, default_value_t = 0)]
        val: u32,
        /// Party A's client-facing address.
        #[arg(long)]
        c0: String,
        /// Party B's client-facing address.
        #[arg(long)]
        c1: String,
    },
    /// runs the authenticated control-channel server.
    ControlServer {
        #[arg(long, default_value = "127.0.0.1:5000")]
        listen: String,
        /// Directory holding private.pem / public.pem.
        #[arg(long, default_value = "keys")]
        key_dir: PathBuf,
        /// Extra demo users as user:password pairs.
        #[arg(long = "user")]
        users: Vec<String>,
    },
    /// enrolls with the control server and relays messages.
    ControlClient {
        #[arg(long, default_value = "127.0.0.1:5000")]
        server: String,
        #[arg(long, default_value = "alice")]
        username: String,
        #[arg(long, default_value = "correct horse battery staple")]
        password: String,
        /// Send one message and exit instead of reading stdin.
        #[arg(long)]
        message: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::PairingServer { listen } => {
            let listener = TcpListener::bind(&listen)?;
            Arc::new(PairingServer::new()).serve(listener)?;
            Ok(())
        }
        Command::Party {
            role,
            rows,
            listen,
            peer_listen,
            peer,
            share,
        } => {
            // A bare port binds on all interfaces, like the client listener.
            let peer_listen = if peer_listen.contains(':') {
                peer_listen
            } else {
                format!("0.0.0.0:{peer_listen}")
            };
            let cfg = PartyConfig {
                role: role.parse::<Role>()?,
                rows,
                listen,
                peer_listen,
                peer,
                pairing: share,
                io_timeout: duoram::party::DEFAULT_IO_TIMEOUT,
            };
            PartyNode::new(cfg).run()?;
            Ok(())
        }
        Command::Coordinator {
            op,
            dim,
            idx,
            val,
            c0,
            c1,
        } => {
            let coord = Coordinator::new(c0, c1);
            match op.as_str() {
                "read" => {
                    let value = coord.read(dim, idx)?;
                    println!("READ idx={idx} -> {value}");
                }
                "write" => {
                    let value = Ring31::new(val);
                    coord.write(dim, idx, value)?;
                    println!("WRITE idx={idx} value={value}");
                }
                other => return Err(format!("--op must be read or write, got {other:?}").into()),
            }
            Ok(())
        }
        Command::ControlServer {
            listen,
            key_dir,
            users,
        } => {
            let mut db = UserDb::with_demo_user();
            for pair in users {
                let (user, password) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("--user expects user:password, got {pair:?}"))?;
                db.add_password(user, password);
            }
            let listener = TcpListener::bind(&listen)?;
            ControlServer::new(db, &key_dir)?.serve(listener)?;
            Ok(())
        }
        Command::ControlClient {
            server,
            username,
            password,
            message,
        } => {
            let mut client = ControlClient::connect(server.as_str(), &username, &password)?;

            if let Some(payload) = message {
                println!("{}", client.send(&payload)?);
                return Ok(());
            }

            info!("interactive session ready; type messages, 'quit' to exit");
            let stdin = io::stdin();
            let mut out = io::stdout();
            loop {
                out.write_all(b"> ")?;
                out.flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim_end();
                if line.eq_ignore_ascii_case("quit") {
                    break;
                }
                println!("{}", client.send(line)?);
            }
            Ok(())
        }
    }
}
