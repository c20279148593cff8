//! Engine-specific planning: turning user requests into transfer requests
//! for the vendor CLI and the `HuggingFace` fetcher.

mod hf;
mod om;

pub use hf::{
    GgufSource, ModelDownload, parse_gguf_url, parse_repo_path, plan_gguf_download,
    plan_vllm_download, sanitize_model_name,
};
pub use om::{
    ProductCategory, ProductDownload, ops_manager_iaas, plan_product_download, select_file_glob,
    stemcell_iaas,
};
