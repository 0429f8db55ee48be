//! faceid - CLI for the face identity registry.
//!
//! Wires the represent service (image -> embeddings) and the Pinecone
//! index into the registry's four operations. Credentials come from
//! the environment: PINECONE_API_KEY (required), PINECONE_INDEX_NAME,
//! FACEID_EMBED_URL.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use faceid_embed::{
    DEFAULT_MODEL, EmbedConfig, FaceEmbedder, FaceEmbedding, ImageInput, RepresentClient,
    model_dimension,
};
use faceid_registry::{Registry, RegistryConfig, RegistryError};
use faceid_vecstore::{Metadata, PineconeConfig, PineconeIndex};

const DEFAULT_INDEX_NAME: &str = "face-recognition-index";

/// Face identity registry CLI.
///
/// Search, register (with duplicate suppression), list and delete
/// face identities stored in a vector index.
#[derive(Parser)]
#[command(name = "faceid")]
#[command(about = "Face identity registry over a vector index")]
#[command(version)]
struct Cli {
    /// Face recognition model; determines the embedding dimension
    #[arg(long, global = true, default_value = DEFAULT_MODEL)]
    model: String,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face from an image
    Register {
        /// Image file (JPEG/PNG)
        image: PathBuf,

        /// Face id (auto-generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Person name stored in metadata
        #[arg(long)]
        name: Option<String>,

        /// Free-text notes stored in metadata
        #[arg(long)]
        notes: Option<String>,

        /// Which detected face to use when the image contains several
        #[arg(long, default_value_t = 0)]
        face: usize,

        /// Skip the duplicate check
        #[arg(long)]
        unchecked: bool,
    },
    /// Search registered faces similar to an image
    Search {
        /// Image file (JPEG/PNG)
        image: PathBuf,

        /// Number of neighbors to retrieve
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Minimum similarity score for a result
        #[arg(long, default_value_t = 0.5)]
        threshold: f32,

        /// Which detected face to use when the image contains several
        #[arg(long, default_value_t = 0)]
        face: usize,
    },
    /// List all registered identities
    List,
    /// Delete a registered identity by id
    Delete { id: String },
    /// Show stored count and index dimension
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    }

    let dimension = model_dimension(&cli.model)
        .with_context(|| format!("unknown model: {}", cli.model))?;
    let registry = connect_registry(dimension).await?;

    match &cli.command {
        Commands::Register {
            image,
            id,
            name,
            notes,
            face,
            unchecked,
        } => {
            let embedder = embedder(&cli.model)?;
            let (selected, total) = pick_face(&embedder, image, *face).await?;
            let metadata = registration_metadata(
                &cli.model,
                name.as_deref(),
                notes.as_deref(),
                *face,
                total,
            );

            let result = if *unchecked {
                registry
                    .register(&selected.embedding, id.as_deref(), metadata)
                    .await
            } else {
                registry
                    .register_guarded(&selected.embedding, id.as_deref(), metadata)
                    .await
            };

            match result {
                Ok(assigned) => println!("registered: {assigned}"),
                Err(RegistryError::DuplicateFound { id, score, metadata }) => {
                    let name = metadata
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("<unnamed>");
                    bail!("refused: near-duplicate of {id} (score {score:.3}, name {name})");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Search {
            image,
            top_k,
            threshold,
            face,
        } => {
            let embedder = embedder(&cli.model)?;
            let (selected, _) = pick_face(&embedder, image, *face).await?;
            let matches = registry
                .search(&selected.embedding, *top_k, *threshold)
                .await?;

            if matches.is_empty() {
                println!("no matches above threshold {threshold}");
            }
            for (i, m) in matches.iter().enumerate() {
                let name = m
                    .metadata
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unnamed>");
                println!("{}. {}  score {:.4}  name {}", i + 1, m.id, m.score, name);
            }
        }
        Commands::List => {
            let entries = registry.list_all().await?;
            if entries.is_empty() {
                println!("registry is empty");
            }
            for e in &entries {
                let name = e
                    .metadata
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unnamed>");
                println!("{}  name {}", e.id, name);
            }
        }
        Commands::Delete { id } => {
            registry.delete(id).await?;
            println!("deleted: {id}");
        }
        Commands::Stats => {
            let stats = registry.stats().await?;
            println!("stored faces: {}", stats.count);
            println!("dimension:    {}", stats.dimension);
        }
    }

    Ok(())
}

fn embedder(model: &str) -> Result<RepresentClient> {
    let base_url =
        std::env::var("FACEID_EMBED_URL").unwrap_or_else(|_| "http://localhost:5005".to_string());
    let client = RepresentClient::with_config(
        EmbedConfig::default()
            .with_model(model)
            .with_base_url(&base_url),
    )?;
    Ok(client)
}

async fn connect_registry(dimension: usize) -> Result<Registry> {
    let api_key =
        std::env::var("PINECONE_API_KEY").context("PINECONE_API_KEY is not set")?;
    let index_name =
        std::env::var("PINECONE_INDEX_NAME").unwrap_or_else(|_| DEFAULT_INDEX_NAME.to_string());

    let store = PineconeIndex::connect(PineconeConfig::new(&api_key, &index_name, dimension))
        .await
        .context("connecting to vector index")?;
    let registry = Registry::connect(Arc::new(store), RegistryConfig::new(dimension)).await?;
    Ok(registry)
}

/// Run detection and pick one face by index. Errors when the index is
/// out of range; prints a hint when the image holds several faces.
async fn pick_face(
    embedder: &RepresentClient,
    image: &PathBuf,
    face: usize,
) -> Result<(FaceEmbedding, usize)> {
    let faces = embedder.represent(&ImageInput::path(image)).await?;
    let total = faces.len();
    if total > 1 && face == 0 {
        eprintln!("note: {total} faces detected, using --face 0");
    }
    let selected = faces
        .into_iter()
        .nth(face)
        .with_context(|| format!("face index {face} out of range ({total} detected)"))?;
    Ok((selected, total))
}

fn registration_metadata(
    model: &str,
    name: Option<&str>,
    notes: Option<&str>,
    face_index: usize,
    faces_detected: usize,
) -> Metadata {
    let mut m = Metadata::new();
    m.insert("name".into(), name.unwrap_or_default().into());
    m.insert("notes".into(), notes.unwrap_or_default().into());
    m.insert(
        "registered_at".into(),
        chrono::Utc::now().to_rfc3339().into(),
    );
    m.insert("model".into(), model.into());
    m.insert("source_face_index".into(), (face_index as u64).into());
    m.insert(
        "source_faces_detected_count".into(),
        (faces_detected as u64).into(),
    );
    m
}
