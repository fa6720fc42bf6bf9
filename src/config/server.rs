use clap::Args;

const MIN_PORT: u16 = 1024;

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Server Options")]
#[group(id = "Server")]
pub struct Options {
    /// Port the server will listen on. 0 asks the OS for an ephemeral port;
    /// the bound port is printed to stderr before the server accepts clients.
    #[arg(long = "listenon")]
    #[arg(env = "AUCTIONEER_LISTENON")]
    #[arg(default_value_t = 0)]
    #[arg(value_parser = parse_port)]
    pub listenon: u16,

    /// Maximum number of simultaneously connected clients. Unlimited when unset.
    /// Only concurrency is capped, never the total number of connections served.
    #[arg(long = "maxconn")]
    #[arg(env = "AUCTIONEER_MAXCONN")]
    pub maxconn: Option<usize>,
}

fn parse_port(value: &str) -> Result<u16, String> {
    let port: u16 = value
        .parse()
        .map_err(|_| "port must be an integer".to_string())?;
    if port != 0 && port < MIN_PORT {
        return Err(format!("port must be 0 or at least {MIN_PORT}"));
    }
    Ok(port)
}
