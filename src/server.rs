use {
    crate::{
        config::RunOptions,
        expiry::run_expiry_loop,
        session,
        state::Store,
    },
    anyhow::Result,
    futures::future::join_all,
    std::{
        sync::{
            atomic::{
                AtomicBool,
                Ordering,
            },
            Arc,
        },
        time::Duration,
    },
    tokio::net::TcpListener,
};

const LISTEN_ERR_MSG: &str = "auctioneer: unable to listen on port";
const LISTEN_ERR_EXIT: i32 = 17;

/// How often the acceptor re-checks the active-session count while the
/// connection cap is saturated. Checked outside the store lock.
pub const CAPACITY_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn start_server(run_options: RunOptions) -> Result<()> {
    tokio::spawn(async move {
        tracing::info!("Registered shutdown signal handler...");
        tokio::signal::ctrl_c().await.unwrap();
        tracing::info!("Shut down signal received, waiting for tasks...");
        SHOULD_EXIT.store(true, Ordering::Release);
    });

    let listener = match TcpListener::bind(("127.0.0.1", run_options.server.listenon)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(?err, port = run_options.server.listenon, "Bind failed");
            fatal_listen_error();
        }
    };
    let port = listener.local_addr()?.port();
    // The bound port goes to stderr bare: clients and harnesses parse it to
    // find the server before connecting.
    eprintln!("{port}");
    tracing::info!(port, maxconn = ?run_options.server.maxconn, "Listening for auction clients");

    let store = Arc::new(Store::new());

    let expiry_loop = tokio::spawn(run_expiry_loop(store.clone()));
    let accept_loop = tokio::spawn(run_accept_loop(
        listener,
        run_options.server.maxconn,
        store.clone(),
    ));
    join_all(vec![expiry_loop, accept_loop]).await;
    Ok(())
}

/// Accept connections for the life of the process, spawning one session
/// worker per client. When a cap is configured the loop sleep-polls the
/// active-session counter until a slot frees up; only concurrency is capped,
/// never the total number of sessions served. A failed accept means the
/// listener is unusable, which ends the process.
pub async fn run_accept_loop(
    listener: TcpListener,
    maxconn: Option<usize>,
    store: Arc<Store>,
) -> Result<()> {
    let mut exit_check_interval = tokio::time::interval(EXIT_CHECK_INTERVAL);

    while !SHOULD_EXIT.load(Ordering::Acquire) {
        if let Some(cap) = maxconn {
            while store.active_sessions() >= cap {
                if SHOULD_EXIT.load(Ordering::Acquire) {
                    return Ok(());
                }
                tokio::time::sleep(CAPACITY_POLL_INTERVAL).await;
            }
        }

        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        store.session_opened();
                        tokio::spawn(session::run_session(store.clone(), stream, peer));
                    }
                    Err(err) => {
                        tracing::error!(?err, "Accept failed");
                        fatal_listen_error();
                    }
                }
            }
            _ = exit_check_interval.tick() => {}
        }
    }
    tracing::info!("Shutting down acceptor...");
    Ok(())
}

fn fatal_listen_error() -> ! {
    eprintln!("{LISTEN_ERR_MSG}");
    std::process::exit(LISTEN_ERR_EXIT);
}

// A static exit flag to indicate to running tasks that we're shutting down.
// This is used to gracefully shutdown the application.
//
// NOTE: A more idiomatic approach would be to use a tokio::sync::broadcast channel, and to send a
// shutdown signal to all running tasks. However, this is a bit more complicated to implement and
// we don't rely on global state for anything else.
pub(crate) static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);
pub const EXIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);
