use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured driver's `validateConfig()` without connecting
    /// to anything.
    Validate {
        #[arg(long, help = "Configuration file path (JSON)")]
        config: String,
    },
    /// Initialize one driver and probe reachability via `testConnection()`.
    TestConnection {
        #[arg(long, help = "Configuration file path (JSON)")]
        config: String,

        #[arg(long, help = "Driver name, e.g. 'postgres', 'bigquery', 'sqs'")]
        driver: String,
    },
    /// Initialize one driver and print its `ReplicatorStatus`.
    Status {
        #[arg(long, help = "Configuration file path (JSON)")]
        config: String,

        #[arg(long, help = "Driver name, e.g. 'postgres', 'bigquery', 'sqs'")]
        driver: String,
    },
    /// Initialize one driver and replicate a single event read from a file
    /// or stdin (`-`).
    Replicate {
        #[arg(long, help = "Configuration file path (JSON)")]
        config: String,

        #[arg(long, help = "Driver name, e.g. 'postgres', 'bigquery', 'sqs'")]
        driver: String,

        #[arg(long, help = "Path to a JSON event document, or '-' for stdin")]
        event: String,
    },
    /// Initialize every configured driver and replicate a stream of
    /// newline-delimited `{"driver": ..., "event": {...}}` records read
    /// from stdin until EOF or a shutdown signal.
    Serve {
        #[arg(long, help = "Configuration file path (JSON)")]
        config: String,
    },
}
