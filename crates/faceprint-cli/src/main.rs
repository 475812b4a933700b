use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceprint_core::{AggregatedProfile, Profile, VerificationResult};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "faceprint", about = "faceprint face enrollment and verification CLI")]
struct Cli {
    /// Base URL of the faceprintd server
    #[arg(long, env = "FACEPRINT_URL", default_value = "http://127.0.0.1:8000", global = true)]
    url: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the face in an image as a new profile
    Enroll {
        image: PathBuf,
    },
    /// Show a stored profile
    Get {
        id: i64,
    },
    /// List stored profiles
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Verify the face in an image against a stored profile
    Verify {
        id: i64,
        image: PathBuf,
    },
    /// Run every loaded model on an image and fuse the embeddings
    Analyze {
        image: PathBuf,
    },
    /// Compare the faces in two images
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
    /// Show server health and loaded models
    Status,
}

struct Api {
    client: Client,
    base: String,
}

impl Api {
    fn new(base: &str) -> Self {
        Self {
            client: Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("cannot reach faceprintd at {}", self.base))?;
        let status = response.status();
        let body: Value = response.json().await.context("invalid response body")?;

        if !status.is_success() {
            let code = body["error"]["code"].as_str().unwrap_or("UNKNOWN");
            let message = body["error"]["message"].as_str().unwrap_or("no message");
            bail!("{status} {code}: {message}");
        }
        serde_json::from_value(body).context("unexpected response shape")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.url(path))).await
    }

    async fn upload<T: DeserializeOwned>(&self, path: &str, files: &[(&str, &Path)]) -> Result<T> {
        let mut form = Form::new();
        for (field, file) in files {
            form = form.part(field.to_string(), image_part(file)?);
        }
        self.send(self.client.post(self.url(path)).multipart(form))
            .await
    }
}

fn mime_for(path: &Path) -> Result<&'static str> {
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .with_context(|| format!("{} does not look like an image file", path.display()))
}

fn image_part(path: &Path) -> Result<Part> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(Part::bytes(bytes).file_name(name).mime_str(mime_for(path)?)?)
}

fn print_profile(p: &Profile) {
    println!("Profile {}", p.id);
    println!("  created:     {}", p.created_at.to_rfc3339());
    println!("  embedding:   {} dims", p.embedding.len());
    if let Some(model) = &p.model {
        println!("  model:       {model}");
    }
    println!("  description: {}", p.description);
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let api = Api::new(&cli.url);
    tracing::debug!(url = %api.base, "using server");

    match cli.command {
        Commands::Enroll { image } => {
            let profile: Profile = api.upload("/api/v1/profiles", &[("file", image.as_path())]).await?;
            if cli.json {
                return print_json(&profile);
            }
            println!("Enrolled {}", image.display());
            print_profile(&profile);
        }
        Commands::Get { id } => {
            let profile: Profile = api.get(&format!("/api/v1/profiles/{id}")).await?;
            if cli.json {
                return print_json(&profile);
            }
            print_profile(&profile);
        }
        Commands::List { skip, limit } => {
            let profiles: Vec<Profile> = api
                .get(&format!("/api/v1/profiles?skip={skip}&limit={limit}"))
                .await?;
            if cli.json {
                return print_json(&profiles);
            }
            if profiles.is_empty() {
                println!("No profiles enrolled");
            }
            for p in &profiles {
                println!("{:>6}  {}  {}", p.id, p.created_at.format("%Y-%m-%d %H:%M:%S"), p.description);
            }
        }
        Commands::Verify { id, image } => {
            let result: VerificationResult = api
                .upload(&format!("/api/v1/verify/{id}"), &[("file", image.as_path())])
                .await?;
            if cli.json {
                return print_json(&result);
            }
            let verdict = if result.is_match { "MATCH" } else { "NO MATCH" };
            println!("{verdict} (score {:.4})", result.score);
        }
        Commands::Analyze { image } => {
            let profile: AggregatedProfile = api.upload("/api/v1/analyze", &[("file", image.as_path())]).await?;
            if cli.json {
                return print_json(&profile);
            }
            println!("Models:     {}", profile.models_used.join(", "));
            println!("Dimensions: {}", profile.aggregated.len());
            println!("Hash:       {}", profile.hash);
            for (model, score) in &profile.confidence_scores {
                println!("  {model}: confidence {score:.3}");
            }
        }
        Commands::Compare { first, second } => {
            let body: Value = api
                .upload("/api/v1/compare", &[("file1", first.as_path()), ("file2", second.as_path())])
                .await?;
            if cli.json {
                return print_json(&body);
            }
            if let Some(sims) = body["similarities"].as_object() {
                for (key, score) in sims {
                    println!("{key:>20}: {:.4}", score.as_f64().unwrap_or(f64::NAN));
                }
            }
            let likely = body["same_person_likely"].as_bool().unwrap_or(false);
            println!("Same person likely: {}", if likely { "yes" } else { "no" });
        }
        Commands::Status => {
            let health: Value = api.get("/health").await?;
            let models: Value = api.get("/api/v1/models").await?;
            if cli.json {
                return print_json(&serde_json::json!({ "health": health, "models": models }));
            }
            println!("faceprintd {} at {}", health["version"].as_str().unwrap_or("?"), api.base);
            println!("  status:   {}", health["status"].as_str().unwrap_or("unknown"));
            println!("  profiles: {}", health["profiles"]);
            println!("  models:   {}", models["loaded_models"]);
            println!("  tried:    {}", models["attempted_models"]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::try_parse_from(["faceprint", "--url", "http://host:9000/", "verify", "7", "me.jpg"]).unwrap();
        assert_eq!(cli.url, "http://host:9000/");
        match cli.command {
            Commands::Verify { id, image } => {
                assert_eq!(id, 7);
                assert_eq!(image, PathBuf::from("me.jpg"));
            }
            _ => panic!("expected verify"),
        }
        assert_eq!(Api::new(&cli.url).url("/health"), "http://host:9000/health");
    }

    #[test]
    fn test_list_defaults() {
        let cli = Cli::try_parse_from(["faceprint", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List { skip: 0, limit: 100 }));
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for(Path::new("a.png")).unwrap(), "image/png");
        assert_eq!(mime_for(Path::new("a.JPG")).unwrap(), "image/jpeg");
        assert!(mime_for(Path::new("notes.txt")).is_err());
    }
}
