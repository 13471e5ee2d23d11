//! # basketvec Eval
//!
//! Qualitative checks for a trained [`EmbeddingTable`](basketvec_core::EmbeddingTable):
//!
//! - [`nearest`] / [`nearest_to_vector`] - cosine top-k lookups
//! - [`project`] - 2-D or 3-D layouts via truncated SVD or exact t-SNE
//! - [`cluster_quality`] - silhouette score of catalog labels
//! - [`KMeans`] and [`interpret_clusters`] - unsupervised grouping,
//!   summarised in catalog terms

pub mod cluster;
pub mod distance;
pub mod nearest;
pub mod projection;

pub use cluster::{cluster_quality, interpret_clusters, labelled_rows, ClusterSummary, KMeans, KMeansModel};
pub use distance::{pairwise_cosine_distances, pairwise_distances, DistanceMatrix, Metric};
pub use nearest::{nearest, nearest_to_vector, Neighbor};
pub use projection::{project, sample, Projection, ProjectionMethod, TsneParams};
