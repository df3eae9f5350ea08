//! BannerForge CLI - Drive the rendering provider from a shell
//!
//! Commands: templates, template, validate, render, assist, upload
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a render or validation fails, 1 on any other error

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use bannerforge_core::{
    collaborators::ImageHost, telemetry, AssistantReply, BannerbearProvider, ChatTurn,
    DesignSession, LanguageModel, PollPolicy, RenderJobClient, SessionError, Settings,
    UnknownFieldError,
};

#[derive(Parser)]
#[command(name = "bannerforge-cli")]
#[command(about = "BannerForge CLI - Template render job client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List templates in the provider project
    Templates,

    /// Show a template's editable fields
    Template {
        /// Template ID
        #[arg(short, long)]
        id: String,
    },

    /// Check edits against a template without rendering
    Validate {
        /// Template ID
        #[arg(short, long)]
        template: String,

        /// Text edit, as field=value (repeatable)
        #[arg(long = "text", value_name = "FIELD=VALUE")]
        texts: Vec<String>,

        /// Image edit, as field=url (repeatable)
        #[arg(long = "image", value_name = "FIELD=URL")]
        images: Vec<String>,
    },

    /// Render a template and wait for the image
    Render {
        /// Template ID
        #[arg(short, long)]
        template: String,

        /// Text edit, as field=value (repeatable)
        #[arg(long = "text", value_name = "FIELD=VALUE")]
        texts: Vec<String>,

        /// Image edit, as field=url (repeatable)
        #[arg(long = "image", value_name = "FIELD=URL")]
        images: Vec<String>,

        /// Status checks before giving up (overrides RENDER_MAX_ATTEMPTS)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Delay between status checks in ms (overrides RENDER_POLL_INTERVAL_MS)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Ask the language model to edit a template's fields from a chat message
    Assist {
        /// Template ID
        #[arg(short, long)]
        template: String,

        /// What to change, in plain words
        #[arg(short, long)]
        message: String,
    },

    /// Upload an image file to the image host and print its public URL
    Upload {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn emit(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

fn fail(code: u8, error: impl std::fmt::Display) -> ExitCode {
    emit(&json!({"success": false, "error": error.to_string()}));
    ExitCode::from(code)
}

fn parse_pair(raw: &str) -> Result<(&str, &str), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field, value)),
        _ => Err(format!("Expected FIELD=VALUE, got '{raw}'")),
    }
}

fn apply_edits(
    session: &mut DesignSession,
    texts: &[String],
    images: &[String],
) -> Result<(), String> {
    for raw in texts {
        let (field, value) = parse_pair(raw)?;
        session
            .set_text(field, value)
            .map_err(|e: UnknownFieldError| e.to_string())?;
    }
    for raw in images {
        let (field, url) = parse_pair(raw)?;
        session
            .set_image_url(field, url)
            .map_err(|e: UnknownFieldError| e.to_string())?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init("warn") {
        eprintln!("{e}");
    }

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => return fail(1, e),
    };

    match cli.command {
        Commands::Upload { file } => {
            let host = match settings.image_host() {
                Ok(h) => h,
                Err(e) => return fail(1, e),
            };
            match host.upload_file(&file) {
                Ok(url) => {
                    emit(&json!({"success": true, "url": url}));
                    ExitCode::SUCCESS
                }
                Err(e) => fail(1, e),
            }
        }
        command => {
            let provider = match settings.render_provider() {
                Ok(p) => p,
                Err(e) => return fail(1, e),
            };
            run_render_command(command, RenderJobClient::new(provider), &settings)
        }
    }
}

fn run_render_command(
    command: Commands,
    client: RenderJobClient<BannerbearProvider>,
    settings: &Settings,
) -> ExitCode {
    match command {
        Commands::Templates => match client.list_templates() {
            Ok(templates) => {
                emit(&json!(templates));
                ExitCode::SUCCESS
            }
            Err(e) => fail(1, e),
        },

        Commands::Template { id } => match client.template_details(&id) {
            Ok(template) => {
                emit(&json!(template));
                ExitCode::SUCCESS
            }
            Err(e) => fail(1, e),
        },

        Commands::Validate { template, texts, images } => {
            let mut session = DesignSession::new();
            match client.template_details(&template) {
                Ok(t) => session.select_template(t),
                Err(e) => return fail(1, e),
            }
            if let Err(e) = apply_edits(&mut session, &texts, &images) {
                return fail(2, e);
            }
            match session.validate() {
                Ok(result) => {
                    emit(&json!(result));
                    if result.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => fail(1, e),
            }
        }

        Commands::Render {
            template,
            texts,
            images,
            max_attempts,
            interval_ms,
        } => {
            let mut session = DesignSession::new();
            match client.template_details(&template) {
                Ok(t) => session.select_template(t),
                Err(e) => return fail(1, e),
            }
            if let Err(e) = apply_edits(&mut session, &texts, &images) {
                return fail(2, e);
            }

            let validation = match session.validate() {
                Ok(v) => v,
                Err(e) => return fail(1, e),
            };
            if !validation.valid {
                emit(&json!({"success": false, "validation": validation}));
                return ExitCode::from(2);
            }

            let defaults = settings.poll_policy();
            let policy = PollPolicy::new(
                max_attempts.unwrap_or(defaults.max_attempts),
                interval_ms.map(Duration::from_millis).unwrap_or(defaults.interval),
            );

            match session.generate(&client, policy) {
                Ok(generated) => {
                    emit(&json!({
                        "success": true,
                        "job": generated.job,
                        "artifact": generated.artifact,
                    }));
                    ExitCode::SUCCESS
                }
                Err(e @ SessionError::NothingToRender) => fail(2, e),
                Err(e @ SessionError::Render(_)) => fail(2, e),
                Err(e) => fail(1, e),
            }
        }

        Commands::Assist { template, message } => {
            let model = match settings.language_model() {
                Ok(m) => m,
                Err(e) => return fail(1, e),
            };
            let mut session = DesignSession::new();
            match client.template_details(&template) {
                Ok(t) => session.select_template(t),
                Err(e) => return fail(1, e),
            }

            // the current field state goes first so the model only names real layers
            let context = json!({"template": template, "modifications": session.modifications()});
            let conversation = [ChatTurn::user(context.to_string()), ChatTurn::user(message)];

            match model.respond(&conversation) {
                Ok(AssistantReply::Text(text)) => {
                    emit(&json!({"success": true, "reply": text}));
                    ExitCode::SUCCESS
                }
                Ok(AssistantReply::Update(command)) => match session.apply(&command) {
                    Ok(()) => {
                        emit(&json!({
                            "success": true,
                            "update": command,
                            "modifications": session.pending_modifications(),
                        }));
                        ExitCode::SUCCESS
                    }
                    Err(e) => fail(2, e),
                },
                Err(e) => fail(1, e),
            }
        }

        Commands::Upload { .. } => fail(1, "upload does not use the rendering provider"),
    }
}
