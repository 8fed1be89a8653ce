//! # Regbus CLI
//!
//! Command line front end for the regbus register-access protocol, carried
//! over TCP instead of a physical serial line:
//!
//! - `regbus serve` runs a simulated peripheral with a sparse register map
//!   and optionally reproducible reset values.
//! - `regbus read` / `regbus write` perform one-shot transactions against a
//!   serving peripheral.
//!
//! Set `RUST_LOG=debug` to see per-frame trace lines.

use std::error::Error;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_num::maybe_hex;
use env_logger::Env;
use tokio::net::{TcpListener, TcpStream};

use regbus_client::{Builder as SessionBuilder, ClientSession};
use regbus_peripheral::SparseRegisters;
use regbus_peripheral::peripheral::Builder as PeripheralBuilder;
use regbus_protocol::Crc;

const DEFAULT_PORT: u16 = 2847;

#[derive(ClapArgs, Copy, Clone)]
struct CrcOpts {
    #[arg(
        long,
        value_parser = maybe_hex::<u8>,
        default_value = "0x47",
        help = "CRC seed"
    )]
    crc_seed: u8,

    #[arg(
        long,
        value_parser = maybe_hex::<u8>,
        default_value = "0x8d",
        help = "CRC generator polynomial"
    )]
    crc_poly: u8,

    #[arg(long, help = "Feed CRC input bits least-significant first")]
    crc_reflect: bool,
}

impl CrcOpts {
    fn to_crc(self) -> Crc {
        Crc::new(self.crc_seed, self.crc_poly, self.crc_reflect)
    }
}

#[derive(ClapArgs, Copy, Clone)]
struct SessionOpts {
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:2847",
        help = "Address of the serving peripheral"
    )]
    connect: SocketAddr,

    #[arg(long, default_value = "1000", help = "Response timeout in milliseconds")]
    timeout_ms: u64,

    #[command(flatten)]
    crc: CrcOpts,
}

#[derive(Subcommand)]
enum Operation {
    /// Serve a simulated peripheral over TCP, one connection at a time
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[arg(short, long, default_value = "127.0.0.1")]
        ip: IpAddr,

        #[arg(long, help = "Seed for reproducible register reset values")]
        seed: Option<u64>,

        #[command(flatten)]
        crc: CrcOpts,
    },
    /// Read a register and print its value
    Read {
        #[arg(value_parser = maybe_hex::<u32>, help = "Register address")]
        addr: u32,

        #[command(flatten)]
        session: SessionOpts,
    },
    /// Write a register (per protocol contract, failures are silent; run
    /// with RUST_LOG=debug to see them)
    Write {
        #[arg(value_parser = maybe_hex::<u32>, help = "Register address")]
        addr: u32,

        #[arg(value_parser = maybe_hex::<u32>, help = "Value to store")]
        data: u32,

        #[command(flatten)]
        session: SessionOpts,
    },
}

#[derive(Parser)]
#[command(about = "Controller and simulated peripheral for the regbus register-access protocol", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    operation: Operation,
}

fn fresh_registers(seed: Option<u64>) -> SparseRegisters {
    let registers = match seed {
        Some(seed) => SparseRegisters::seeded(seed),
        None => SparseRegisters::new(),
    };
    registers.on_change(|addr, data| log::info!("mem[{:08x}] = {:08x}", addr, data))
}

async fn serve(ip: IpAddr, port: u16, seed: Option<u64>, crc: Crc) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
    log::info!("Peripheral listening on {}", listener.local_addr()?);

    serve_on(listener, seed, crc, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

/// Accept controller connections one at a time until `shutdown` resolves.
/// Shutdown is honored both between connections and while one is being
/// served.
async fn serve_on<F>(listener: TcpListener, seed: Option<u64>, crc: Crc, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                log::info!("New controller connection from {}", peer);

                // Each connection gets a freshly reset register map; with
                // --seed the reset values repeat across connections.
                let peripheral = PeripheralBuilder::new()
                    .crc(crc)
                    .build(fresh_registers(seed), stream);
                tokio::select! {
                    served = peripheral.serve() => match served {
                        Ok(_) => log::info!("Controller disconnected"),
                        Err(error) => log::error!("Connection error: {}", error),
                    },
                    _ = &mut shutdown => {
                        log::info!("Shutting down");
                        return Ok(());
                    }
                }
            }
            _ = &mut shutdown => {
                log::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn connect_session(opts: SessionOpts) -> Result<ClientSession<TcpStream>, Box<dyn Error>> {
    let stream = TcpStream::connect(opts.connect).await?;
    log::debug!("Connected to {}", opts.connect);

    let mut session = SessionBuilder::new()
        .crc(opts.crc.to_crc())
        .response_timeout(Duration::from_millis(opts.timeout_ms))
        .build();
    session.attach(stream);
    Ok(session)
}

async fn run_read(addr: u32, opts: SessionOpts) -> Result<(), Box<dyn Error>> {
    let mut session = connect_session(opts).await?;
    let data = session.read(addr).await?;
    println!("{:#010x}", data);
    session.close().await;
    Ok(())
}

async fn run_write(addr: u32, data: u32, opts: SessionOpts) -> Result<(), Box<dyn Error>> {
    let mut session = connect_session(opts).await?;
    session.write(addr, data).await;
    session.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.operation {
        Operation::Serve {
            port,
            ip,
            seed,
            crc,
        } => serve(ip, port, seed, crc.to_crc()).await,
        Operation::Read { addr, session } => run_read(addr, session).await,
        Operation::Write {
            addr,
            data,
            session,
        } => run_write(addr, data, session).await,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn shutdown_interrupts_a_connected_controller() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(serve_on(listener, Some(1), Crc::default(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }));

        // Hold a connection open across the shutdown deadline; the serving
        // loop must still stop.
        let _controller = TcpStream::connect(addr).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("serving loop did not observe shutdown during a connection")
            .unwrap()
            .unwrap();
    }
}
