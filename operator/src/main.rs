use clap::{Parser, Subcommand};
use kube::client::Client;
use owo_colors::OwoColorize;

mod autoscalers;
mod fleets;
mod gametypes;
mod servers;
mod util;

/// Top-level CLI configuration for the binary. Any command line
/// flags should go in here.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// List of subcommands for the binary. Clap will convert the
/// name of each enum variant to kebab-case for the CLI.
/// e.g. `ManageServers` becomes `manage-servers`.
#[derive(Subcommand)]
enum Command {
    ManageServers {
        /// Consent sidecar image injected into every server pod.
        #[arg(
            long,
            env = "SIDECAR_IMAGE",
            default_value = util::pod::DEFAULT_SIDECAR_IMAGE
        )]
        sidecar_image: String,

        /// Pull secret attached to server pods, if the registry needs one.
        #[arg(long, env = "IMAGE_PULL_SECRET_NAME")]
        image_pull_secret_name: Option<String>,
    },
}

/// Secondary entrypoint that runs the appropriate subcommand.
async fn run(client: Client) {
    let cli = Cli::parse();

    match cli.command {
        Command::ManageServers {
            sidecar_image,
            image_pull_secret_name,
        } => {
            let pods = servers::PodConfig {
                sidecar_image,
                image_pull_secret: image_pull_secret_name,
            };

            loputoo_common::signal_ready();

            tokio::select! {
                _ = loputoo_common::shutdown::shutdown_signal() => {
                    println!("{}", "🛑 Shutting down controllers.".red());
                }
                result = async {
                    tokio::try_join!(
                        servers::run(client.clone(), pods.clone()),
                        fleets::run(client.clone()),
                        gametypes::run(client.clone()),
                        autoscalers::run(client),
                    )
                } => {
                    result.unwrap();

                    // The controllers run until the watch streams end,
                    // which only happens when something is badly wrong.
                    panic!("controllers exited unexpectedly");
                }
            }
        }
    }
}

/// Main entrypoint that sets up the environment before running the secondary entrypoint `run`.
#[tokio::main]
async fn main() {
    loputoo_common::init();

    // Set the panic hook to exit the process with a non-zero exit code
    // when a panic occurs on any thread. This is desired behavior when
    // running in a container, as a controller may panic and we always
    // want to restart the container in that case.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // Create a kubernetes client using the default configuration.
    // In-cluster, the kubeconfig will be set by the service account.
    let client: Client = Client::try_default()
        .await
        .expect("Expected a valid KUBECONFIG environment variable.");

    run(client).await;
}
