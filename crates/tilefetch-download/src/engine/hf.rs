//! Model downloads through the `HuggingFace` fetcher.
//!
//! Two shapes are supported: GGUF models, where a quantization subfolder is
//! fetched and its shards merged into one file, and vLLM models, where the
//! repository's root weights and configs are packed into a flat archive.

use std::path::{Path, PathBuf};

use tilefetch_core::{JobId, JobKind, ProgressSample, TransferError};

use crate::postprocess::{GGUF_EXTENSION, PostProcessor};
use crate::process::CommandSpec;
use crate::session::{Milestones, TransferRequest};

const HF_URL_PREFIX: &str = "https://huggingface.co/";

/// Sanitize a model name for use as a file or directory name.
#[must_use]
pub fn sanitize_model_name(name: &str) -> String {
    name.trim().replace(['/', '\\', ':'], "_")
}

/// Repository and subfolder of a GGUF download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgufSource {
    /// `owner/repo`
    pub repo: String,
    /// Path below the revision, e.g. `UD-Q6_K_XL`. May be empty.
    pub subpath: String,
}

impl GgufSource {
    /// `--include` pattern selecting the subfolder's files.
    #[must_use]
    pub fn include_pattern(&self) -> String {
        if self.subpath.is_empty() {
            format!("*.{GGUF_EXTENSION}")
        } else {
            format!("{}/*", self.subpath)
        }
    }
}

fn strip_host(url: &str) -> &str {
    let url = url.trim();
    url.strip_prefix(HF_URL_PREFIX).unwrap_or(url)
}

/// Parse `https://huggingface.co/<owner>/<repo>/tree/<rev>/<subpath>`.
pub fn parse_gguf_url(url: &str) -> Result<GgufSource, TransferError> {
    let parts: Vec<&str> = strip_host(url).trim_end_matches('/').split('/').collect();
    if parts.len() < 4 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(TransferError::invalid("invalid HuggingFace URL format"));
    }

    Ok(GgufSource {
        repo: format!("{}/{}", parts[0], parts[1]),
        subpath: parts[4..].join("/"),
    })
}

/// Repository path of a model URL: host, trailing slash, and any
/// `/tree/...` suffix removed.
pub fn parse_repo_path(url: &str) -> Result<String, TransferError> {
    let path = strip_host(url).trim_end_matches('/');
    let path = path.find("/tree/").map_or(path, |idx| &path[..idx]);
    if path.is_empty() {
        return Err(TransferError::invalid("invalid HuggingFace URL format"));
    }
    Ok(path.to_string())
}

/// A planned model download.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDownload {
    /// Job id; the model name as the user gave it.
    pub job_id: JobId,
    pub kind: JobKind,
    pub repo: String,
    /// Fetcher arguments (without the program).
    pub args: Vec<String>,
    /// Directory the fetcher writes into.
    pub destination: PathBuf,
    pub post_process: PostProcessor,
    pub cleanup_dir: Option<PathBuf>,
    pub milestones: Milestones,
}

impl ModelDownload {
    /// Fetcher invocation.
    #[must_use]
    pub fn command(&self, cli: &Path) -> CommandSpec {
        CommandSpec::new(cli)
            .args(self.args.iter().cloned())
            .env("HF_HUB_DISABLE_TELEMETRY", "1")
    }

    /// Session request.
    #[must_use]
    pub fn into_request(self, cli: &Path) -> TransferRequest {
        let command = self.command(cli);
        let mut request = TransferRequest::new(self.job_id, self.kind, command, self.destination)
            .with_post_process(self.post_process)
            .with_milestones(self.milestones);
        request.cleanup_dir = self.cleanup_dir;
        request
    }
}

fn validate(download_location: &Path, model_name: &str) -> Result<String, TransferError> {
    if download_location.as_os_str().is_empty() {
        return Err(TransferError::invalid("download location not set"));
    }
    let dir_name = sanitize_model_name(model_name);
    if dir_name.is_empty() {
        return Err(TransferError::invalid("model name not set"));
    }
    Ok(dir_name)
}

fn push_token(args: &mut Vec<String>, hf_token: Option<&str>) {
    if let Some(token) = hf_token.filter(|t| !t.trim().is_empty()) {
        args.push("--token".to_string());
        args.push(token.to_string());
    }
}

/// Plan a GGUF download into `<location>/<name>`, merged into
/// `<location>/<name>/<name>.gguf`.
pub fn plan_gguf_download(
    download_location: &Path,
    url: &str,
    model_name: &str,
    hf_token: Option<&str>,
) -> Result<ModelDownload, TransferError> {
    let dir_name = validate(download_location, model_name)?;
    let source = parse_gguf_url(url)?;
    let destination = download_location.join(&dir_name);

    let mut args = vec![
        "download".to_string(),
        source.repo.clone(),
        "--include".to_string(),
        source.include_pattern(),
        "--local-dir".to_string(),
        destination.display().to_string(),
        "--local-dir-use-symlinks".to_string(),
        "False".to_string(),
    ];
    push_token(&mut args, hf_token);

    Ok(ModelDownload {
        job_id: JobId::new(model_name.trim()),
        kind: JobKind::MultiPartModel,
        repo: source.repo,
        args,
        destination,
        post_process: PostProcessor::concatenate(dir_name),
        cleanup_dir: None,
        milestones: Milestones {
            starting: Some(ProgressSample::percent(10.0, "Starting download...")),
            running: Some(ProgressSample::percent(
                20.0,
                "Downloading files from HuggingFace...",
            )),
            completing: Some(ProgressSample::percent(90.0, "Concatenating GGUF files...")),
        },
    })
}

/// Plan a vLLM download into `<location>/<name>_temp`, archived to
/// `<location>/<name>.tar.gz`. The temporary directory is always removed.
pub fn plan_vllm_download(
    download_location: &Path,
    url: &str,
    model_name: &str,
    hf_token: Option<&str>,
) -> Result<ModelDownload, TransferError> {
    let dir_name = validate(download_location, model_name)?;
    let repo = parse_repo_path(url)?;
    let temp_dir = download_location.join(format!("{dir_name}_temp"));
    let archive = download_location.join(format!("{dir_name}.tar.gz"));

    let mut args = vec!["download".to_string(), repo.clone()];
    for pattern in ["*.safetensors", "*.json", "*.jinja"] {
        args.push("--include".to_string());
        args.push(pattern.to_string());
    }
    args.extend([
        "--exclude".to_string(),
        "*/*".to_string(),
        "--local-dir".to_string(),
        temp_dir.display().to_string(),
    ]);
    push_token(&mut args, hf_token);

    Ok(ModelDownload {
        job_id: JobId::new(model_name.trim()),
        kind: JobKind::DirectoryModel,
        repo,
        args,
        destination: temp_dir.clone(),
        post_process: PostProcessor::archive(archive),
        cleanup_dir: Some(temp_dir),
        milestones: Milestones {
            starting: Some(ProgressSample::percent(10.0, "Downloading model files...")),
            running: Some(ProgressSample::percent(
                30.0,
                "Downloading model files from HuggingFace...",
            )),
            completing: Some(ProgressSample::percent(80.0, "Packaging model...")),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gguf_url_yields_repo_and_subpath() {
        let source = parse_gguf_url(
            "https://huggingface.co/unsloth/Llama-3.3-70B-Instruct-GGUF/tree/main/UD-Q6_K_XL",
        )
        .unwrap();
        assert_eq!(source.repo, "unsloth/Llama-3.3-70B-Instruct-GGUF");
        assert_eq!(source.subpath, "UD-Q6_K_XL");
        assert_eq!(source.include_pattern(), "UD-Q6_K_XL/*");
    }

    #[test]
    fn short_gguf_url_is_invalid() {
        let err = parse_gguf_url("https://huggingface.co/unsloth/Llama").unwrap_err();
        assert_eq!(err, TransferError::invalid("invalid HuggingFace URL format"));
    }

    #[test]
    fn gguf_url_without_subpath_includes_all_gguf() {
        let source = parse_gguf_url("https://huggingface.co/o/r/tree/main/").unwrap();
        assert_eq!(source.include_pattern(), "*.gguf");
    }

    #[test]
    fn repo_path_drops_tree_suffix_and_slash() {
        assert_eq!(
            parse_repo_path("https://huggingface.co/openai/gpt-oss-120b/tree/main").unwrap(),
            "openai/gpt-oss-120b"
        );
        assert_eq!(
            parse_repo_path("https://huggingface.co/openai/gpt-oss-120b/").unwrap(),
            "openai/gpt-oss-120b"
        );
        assert!(parse_repo_path("https://huggingface.co/").is_err());
    }

    #[test]
    fn gguf_plan_has_fetcher_args_and_merge_step() {
        let plan = plan_gguf_download(
            Path::new("/dl"),
            "https://huggingface.co/o/r/tree/main/Q4_K_M",
            "llama",
            None,
        )
        .unwrap();
        assert_eq!(
            plan.args,
            vec![
                "download", "o/r", "--include", "Q4_K_M/*", "--local-dir", "/dl/llama",
                "--local-dir-use-symlinks", "False"
            ]
        );
        assert_eq!(plan.kind, JobKind::MultiPartModel);
        assert_eq!(plan.post_process, PostProcessor::concatenate("llama"));
        assert_eq!(plan.job_id, JobId::new("llama"));
    }

    #[test]
    fn vllm_plan_uses_temp_dir_and_archive() {
        let plan = plan_vllm_download(
            Path::new("/dl"),
            "https://huggingface.co/openai/gpt-oss-120b",
            "gpt",
            Some("hf_abc"),
        )
        .unwrap();
        assert_eq!(plan.destination, PathBuf::from("/dl/gpt_temp"));
        assert_eq!(plan.cleanup_dir, Some(PathBuf::from("/dl/gpt_temp")));
        assert_eq!(plan.post_process, PostProcessor::archive("/dl/gpt.tar.gz"));
        assert_eq!(&plan.args[plan.args.len() - 2..], ["--token", "hf_abc"]);
        assert!(plan.args.windows(2).any(|w| w == ["--exclude", "*/*"]));

        let request = plan.into_request(Path::new("hf"));
        assert_eq!(request.cleanup_dir, Some(PathBuf::from("/dl/gpt_temp")));
        assert_eq!(request.kind, JobKind::DirectoryModel);
    }

    #[test]
    fn empty_location_is_invalid() {
        let err = plan_vllm_download(Path::new(""), "https://huggingface.co/a/b", "m", None)
            .unwrap_err();
        assert_eq!(err, TransferError::invalid("download location not set"));
    }

    #[test]
    fn model_name_is_sanitized_for_paths() {
        assert_eq!(sanitize_model_name("org/model:q4"), "org_model_q4");
    }
}
