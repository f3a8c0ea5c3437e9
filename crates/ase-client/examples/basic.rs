//! Log in, run one language batch and print the packages of the response.
//!
//! # Running
//!
//! ```bash
//! export ASE_HOST=localhost
//! export ASE_PORT=5000
//! export ASE_USER=sa
//! export ASE_PASSWORD=myPassword
//!
//! RUST_LOG=debug cargo run --example basic -- "select @@version"
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ase_client::{Config, Connection, Credentials, Error, LoginConfig};
use ase_protocol::Package;
use ase_protocol::package::LanguagePackage;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let host = std::env::var("ASE_HOST").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("ASE_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5000);
    let user = std::env::var("ASE_USER").unwrap_or_else(|_| "sa".into());
    let password = std::env::var("ASE_PASSWORD").unwrap_or_default();
    let batch = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "select @@version".into());

    let config = Config::new()
        .host(&host)
        .port(port)
        .credentials(Credentials::new(user, password));
    let login = LoginConfig::new(&config).app_name("ase-client-example");

    println!("Connecting to {host}:{port}...");
    let conn = Connection::connect(config).await?;
    let channel = conn.primary_channel().await?;
    channel.register_env_change_hook(|kind, old, new| {
        println!("environment change {kind}: {old} -> {new}");
    });

    channel.login(&login).await?;
    println!("Logged in, packet size {}", conn.packet_size());

    channel
        .send_package(&Package::Language(LanguagePackage::new(&batch)))
        .await?;
    loop {
        let package = channel.next_package(true).await?;
        println!("{package}");
        if package.is_done_final() {
            break;
        }
    }

    conn.close().await
}
