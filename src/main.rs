use clap::Parser;
use tracing::{info, warn};

use radeval::api::ApiClient;
use radeval::case_builder::build_case;
use radeval::catalog::MetricCatalog;
use radeval::config::{CliArgs, ClientConfig};
use radeval::records::{load_records, FetchGuard, RecordSource};
use radeval::session::EvaluationSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radeval=info".into()),
        )
        .init();

    let args = CliArgs::parse();
    info!("Starting radeval v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::new(&args.base_url)?;
    let client = ApiClient::new(&config)?;

    match (&args.token, &args.email) {
        (Some(token), _) => client.set_token(token),
        (None, Some(email)) => {
            client.login(email, args.password.as_deref()).await?;
        }
        (None, None) => {
            anyhow::bail!("either --token or --email is required");
        }
    }

    let user = client.user_details(None).await?;
    info!("Evaluator: {} <{}>", user.name, user.email);

    let source = match &args.assignment {
        Some(id) => RecordSource::Assignment(id.clone()),
        None => RecordSource::All,
    };

    let guard = FetchGuard::new();
    if !guard.try_begin(source.cache_key()) {
        anyhow::bail!("records for {} already being fetched", source.cache_key());
    }

    let catalog = MetricCatalog::new(&client);
    let records = load_records(&client, &catalog, &source).await?;
    let Some(built) = build_case(&records) else {
        warn!("No assigned images to evaluate");
        return Ok(());
    };

    if let Some(assignment_id) = &args.assignment {
        client.start_assignment(assignment_id).await;
    }

    let metrics = catalog.get_metrics().await?;
    let session = EvaluationSession::new(&client, built, metrics, args.start_index);

    let case = session.case();
    println!("Case: {} ({})", case.study_id, case.id);
    println!(
        "Progress: {}% — {} of {} images completed",
        case.total_progress,
        session.completed_images(),
        case.images.len()
    );
    for image in &case.images {
        println!(
            "  [{}] {} — {}/{} models evaluated ({})",
            image.image_index,
            image.study_id.as_deref().unwrap_or(&image.image_id),
            image.completed_models,
            image.total_models,
            image.evaluation_status.as_str()
        );
    }
    println!("Resume at image index {}", session.resume_point());

    Ok(())
}
