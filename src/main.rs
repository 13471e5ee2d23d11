use anyhow::{bail, Context};
use basketvec::config::PipelineConfig;
use basketvec_core::{
    build_corpus, customer_records, load_jsonl, product_records, Aisle, Catalog, CatalogLevel,
    Department, EmbeddingTable, Error, HashingTrainer, Order, OrderLine, Product,
};
use basketvec_eval::{
    cluster_quality, interpret_clusters, labelled_rows, nearest, project, sample, KMeans, Metric,
    ProjectionMethod, TsneParams,
};
use basketvec_storage::{ModelManager, ModelSource};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Entity {
    Product,
    Customer,
}

/// Train or load basket embeddings and report how they look
#[derive(Parser, Debug)]
#[command(name = "basketvec")]
#[command(about = "Product and customer embeddings from order histories", long_about = None)]
struct Args {
    /// Order lines, one JSON object per line
    #[arg(short, long)]
    records: PathBuf,

    /// Orders, one JSON object per line (required for customer embeddings)
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Product catalog used to label clusters
    #[arg(long, requires_all = ["aisles", "departments"])]
    products: Option<PathBuf>,

    #[arg(long, requires = "products")]
    aisles: Option<PathBuf>,

    #[arg(long, requires = "products")]
    departments: Option<PathBuf>,

    /// Which entities to embed
    #[arg(long, value_enum, default_value_t = Entity::Product)]
    entity: Entity,

    /// Directory holding cached embedding tables
    #[arg(long, default_value = "./models")]
    cache_dir: PathBuf,

    /// Train and overwrite the cached table instead of loading it
    #[arg(long)]
    retrain: bool,

    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured embedding dimension
    #[arg(long)]
    dimension: Option<usize>,

    /// Entity id to report nearest neighbours for
    #[arg(short, long)]
    query: Option<String>,

    /// Number of neighbours to report
    #[arg(short, default_value_t = 10)]
    k: usize,

    /// Override the configured number of k-means clusters
    #[arg(long)]
    clusters: Option<usize>,

    /// Write the 2-D t-SNE layout of the sampled rows to this JSON file
    #[arg(long)]
    projection_out: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable logging
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.quiet {
        let log_level = match args.log_level.as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Starting basketvec v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dimension) = args.dimension {
        config.dimension = dimension;
    }
    if let Some(clusters) = args.clusters {
        config.clusters = clusters;
    }

    let lines: Vec<OrderLine> = load_jsonl(&args.records)
        .with_context(|| format!("loading order lines from {}", args.records.display()))?;

    let manager = ModelManager::new(&args.cache_dir)?;
    let source = ModelSource::from_retrain_flag(args.retrain);
    let trainer = HashingTrainer::default();

    let table = match args.entity {
        Entity::Product => {
            let corpus = build_corpus(&product_records(&lines))?;
            log_corpus(&corpus);
            manager.product_table(source, &corpus, &trainer, &config.train_params())?
        }
        Entity::Customer => {
            let Some(orders_path) = &args.orders else {
                bail!("--orders is required for customer embeddings");
            };
            let orders: Vec<Order> = load_jsonl(orders_path)
                .with_context(|| format!("loading orders from {}", orders_path.display()))?;
            let corpus = build_corpus(&customer_records(&lines, &orders))?;
            log_corpus(&corpus);
            manager.customer_table(source, &corpus.tagged(), &trainer, &config.doc_train_params())?
        }
    };
    info!(
        "Embedding table ready: {} entities, dimension {}",
        table.len(),
        table.dimension()
    );

    if let Some(query) = &args.query {
        report_neighbours(&table, query, args.k)?;
    }

    let catalog = load_catalog(&args)?;
    let sampled = sample(&table, config.sample_size, config.seed);

    if let Some(path) = &args.projection_out {
        let method = ProjectionMethod::Tsne(TsneParams {
            seed: config.seed,
            perplexity: TsneParams::default()
                .perplexity
                .min((sampled.len().saturating_sub(1)) as f32 / 3.0)
                .max(1.0),
            ..TsneParams::default()
        });
        match project(&sampled, 2, &method) {
            Ok(projection) => {
                let file = std::fs::File::create(path)?;
                serde_json::to_writer(std::io::BufWriter::new(file), &projection)?;
                info!("Wrote {} projected points to {}", projection.len(), path.display());
            }
            Err(e @ (Error::InsufficientData(_) | Error::InvalidConfig(_))) => {
                warn!("Skipping projection: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let (Some(catalog), Entity::Product) = (&catalog, args.entity) {
        let (vectors, labels) = labelled_rows(&sampled, catalog, CatalogLevel::Department);
        match cluster_quality(&vectors, &labels, Metric::Cosine) {
            Ok(score) => info!(
                "Department silhouette over {} products: {:.4}",
                vectors.len(),
                score
            ),
            Err(Error::InsufficientData(reason)) => {
                warn!("Skipping cluster quality: {}", reason);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if config.clusters > 0 {
        report_clusters(&sampled, catalog.as_ref(), args.entity, &config)?;
    }

    Ok(())
}

fn log_corpus(corpus: &basketvec_core::Corpus) {
    let stats = corpus.stats();
    info!(
        "Corpus: {} sequences, {} tokens, {} distinct, mean length {:.2}, max length {}",
        stats.sequences, stats.tokens, stats.vocabulary, stats.mean_length, stats.max_length
    );
}

fn load_catalog(args: &Args) -> anyhow::Result<Option<Catalog>> {
    let (Some(products), Some(aisles), Some(departments)) =
        (&args.products, &args.aisles, &args.departments)
    else {
        return Ok(None);
    };
    let products: Vec<Product> = load_jsonl(products)?;
    let aisles: Vec<Aisle> = load_jsonl(aisles)?;
    let departments: Vec<Department> = load_jsonl(departments)?;
    let catalog = Catalog::new(&products, &aisles, &departments)?;
    info!("Catalog loaded: {} products", catalog.len());
    Ok(Some(catalog))
}

fn report_neighbours(table: &EmbeddingTable, query: &str, k: usize) -> anyhow::Result<()> {
    let neighbours = nearest(table, query, k, false)?;
    println!("Nearest to {}:", query);
    for n in neighbours {
        println!("  {:<24} {:.4}", n.entity_id, n.similarity);
    }
    Ok(())
}

fn report_clusters(
    table: &EmbeddingTable,
    catalog: Option<&Catalog>,
    entity: Entity,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let rows: Vec<&[f32]> = table.iter().map(|(_, v)| v.as_slice()).collect();
    let model = match KMeans::new(config.clusters).with_seed(config.seed).fit(&rows) {
        Ok(model) => model,
        Err(Error::InsufficientData(reason)) => {
            warn!("Skipping k-means: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match (catalog, entity) {
        (Some(catalog), Entity::Product) => {
            let ids: Vec<&str> = table.ids().collect();
            let summaries =
                interpret_clusters(&ids, &model.labels, catalog, CatalogLevel::Aisle, 3)?;
            for s in summaries {
                let labels: Vec<String> = s
                    .top_labels
                    .iter()
                    .map(|(label, count)| format!("{} ({})", label, count))
                    .collect();
                println!("Cluster {:>3} [{} items]: {}", s.cluster, s.size, labels.join(", "));
            }
        }
        _ => {
            let mut sizes = vec![0usize; config.clusters];
            for &label in &model.labels {
                sizes[label] += 1;
            }
            for (cluster, size) in sizes.iter().enumerate() {
                println!("Cluster {:>3} [{} items]", cluster, size);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_flags_must_come_together() {
        assert!(Args::try_parse_from(["basketvec", "-r", "lines.jsonl", "--aisles", "a.jsonl"]).is_err());
        assert!(
            Args::try_parse_from(["basketvec", "-r", "lines.jsonl", "--departments", "d.jsonl"])
                .is_err()
        );
        assert!(Args::try_parse_from(["basketvec", "-r", "lines.jsonl", "--products", "p.jsonl"]).is_err());

        let args = Args::try_parse_from([
            "basketvec",
            "-r",
            "lines.jsonl",
            "--products",
            "p.jsonl",
            "--aisles",
            "a.jsonl",
            "--departments",
            "d.jsonl",
        ])
        .unwrap();
        assert!(args.products.is_some() && args.aisles.is_some() && args.departments.is_some());
    }
}
