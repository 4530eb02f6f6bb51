// Submodules for separation of concerns
mod eval;
mod exec;
mod explain;
mod parse;
mod types;

pub use eval::{compare_bson, compare_docs, eval_filter, get_path, project, values_equal};
pub use exec::{
    ExecStats, apply_update, delete_one, find_docs, find_with_stats, plan_candidates, update_one,
};
pub(crate) use eval::{insert_path, remove_path};
pub use explain::explain_find;
pub use parse::{UpdateDocSerde, parse_filter, parse_projection, parse_sort, parse_update};
#[cfg(feature = "regex")]
pub use types::Pattern;
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, Projection, SortSpec, UpdateDoc, UpdateReport,
};
