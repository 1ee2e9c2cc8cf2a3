//! Pipeline stages
//!
//! Each stage reads and writes files only; stages never hold handles across
//! calls.

pub mod classifier;
pub mod dataset_merger;
pub mod fold_partitioner;
pub mod groundtruth_joiner;
pub mod record_validator;

pub use classifier::ClassifierInvoker;
pub use dataset_merger::{DatasetMerger, MergeReport};
pub use fold_partitioner::{split_number, FoldPair, FoldPartitioner, PartitionReport};
pub use groundtruth_joiner::{GroundTruth, GroundTruthJoiner, JoinOptions, JoinReport, LabelDomainMode};
pub use record_validator::{RecordValidator, RejectReason, Validation};
