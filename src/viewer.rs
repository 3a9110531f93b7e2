//! Public note pages
//!
//! Rendered from the public copy of a note: preview metadata for social media, and a
//! little script that tries to open the note in the companion app

use std::str::Utf8Error;

use axum::Extension;
use axum::Router;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::json;

use crate::config::ViewerConfig;
use crate::mirror::PublicNote;
use crate::password::verify;
use crate::storage::Storage;
use crate::utils::escape_html;

const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/300.png?text=Note";
const PROTECTED_DESCRIPTION: &str = "This note is password protected.";

const STYLE: &str = "
      body { font-family: sans-serif; margin: 20px; line-height: 1.6; }
      h1 { color: #333; }
      p { color: #555; }
      img { margin-top: 15px; border-radius: 5px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
      #actions { margin-top: 25px; }
      button { padding: 10px 15px; font-size: 1em; cursor: pointer; margin-right: 10px; }
      .error { color: #b00020; }
";

/// Expects a `note` object with the links to use
const SCRIPT: &str = r#"
      function tryOpenApp() {
        const userAgent = navigator.userAgent || navigator.vendor || window.opera;

        // no feedback when the app is missing, assume it is after a while
        const timeout = setTimeout(function () {
          if (/android/i.test(userAgent) && note.playStoreLink) {
            window.location.href = note.playStoreLink;
          } else if (/iPad|iPhone|iPod/.test(userAgent) && !window.MSStream && note.appStoreLink) {
            window.location.href = note.appStoreLink;
          } else {
            alert("App not found. Please install it from the app store or use the web app.");
          }
        }, 2500);

        // the page is hidden when the app opened
        document.addEventListener("visibilitychange", function () {
          if (document.visibilityState === "hidden") {
            clearTimeout(timeout);
          }
        });
        window.addEventListener("pagehide", function () {
          clearTimeout(timeout);
        });

        window.location.href = note.appUrl;
      }

      function goToWebApp() {
        window.location.href = note.webAppUrl;
      }
"#;

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>
<html><head><title>Note Not Found</title></head>
<body><h1>404 - Note Not Found</h1><p>The requested note does not exist or is not public.</p></body></html>";

const INTERNAL_ERROR_PAGE: &str = "<!DOCTYPE html>
<html><head><title>Error</title></head>
<body><h1>500 - Internal Server Error</h1><p>An error occurred while trying to retrieve the note.</p></body></html>";

/// Get the router for the public pages
pub fn router<S: Storage>() -> Router {
    Router::new()
        .route("/notes", get(missing_note_id))
        .route("/notes/", get(missing_note_id))
        .route("/notes/{note}", get(view::<S>).post(unlock::<S>))
        .fallback(not_found)
}

/// Show the public page of a note
pub async fn view<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(config): Extension<ViewerConfig>,
    uri: Uri,
) -> Response {
    let note_id = match note_id_from_uri(&uri) {
        Ok(note_id) => note_id,
        Err(response) => return response,
    };

    tracing::info!("Viewing public note {note_id}");

    match find_public_note(&storage, &note_id).await {
        Ok(public_note) => {
            let body = if public_note.password_protected {
                Body::PasswordForm { failed: false }
            } else {
                Body::Content
            };

            html(StatusCode::OK, render_page(&public_note, &config, &body))
        }
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub struct UnlockForm {
    #[serde(default)]
    password: String,
}

/// Show the public page of a password protected note
pub async fn unlock<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(config): Extension<ViewerConfig>,
    uri: Uri,
    axum::Form(form): axum::Form<UnlockForm>,
) -> Response {
    let note_id = match note_id_from_uri(&uri) {
        Ok(note_id) => note_id,
        Err(response) => return response,
    };

    let public_note = match find_public_note(&storage, &note_id).await {
        Ok(public_note) => public_note,
        Err(response) => return response,
    };

    if !public_note.password_protected {
        return html(
            StatusCode::OK,
            render_page(&public_note, &config, &Body::Content),
        );
    }

    let note = match storage
        .find_single_note_by_id(&public_note.owner_id, &public_note.note_id)
        .await
    {
        Ok(Some(note)) => note,
        Ok(None) => {
            tracing::warn!("Public note {note_id} has no source note");

            return html(StatusCode::NOT_FOUND, NOT_FOUND_PAGE.to_string());
        }
        Err(err) => {
            tracing::error!("Error retrieving note {note_id}: {err}");

            return html(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_PAGE.to_string(),
            );
        }
    };

    let unlocked = note
        .public_password
        .as_deref()
        .is_some_and(|hashed_password| verify(hashed_password, &form.password));

    if unlocked {
        html(
            StatusCode::OK,
            render_page(&public_note, &config, &Body::Content),
        )
    } else {
        tracing::debug!("Wrong password for public note {note_id}");

        html(
            StatusCode::FORBIDDEN,
            render_page(&public_note, &config, &Body::PasswordForm { failed: true }),
        )
    }
}

#[allow(clippy::unused_async)]
async fn missing_note_id() -> Response {
    tracing::warn!("Note ID not found in path");

    (StatusCode::BAD_REQUEST, "Invalid request: Note ID missing.").into_response()
}

#[allow(clippy::unused_async)]
async fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// Look up a public note, or the page to show instead
async fn find_public_note<S: Storage>(
    storage: &S,
    note_id: &str,
) -> Result<PublicNote, Response> {
    match storage.find_public_note(note_id).await {
        Ok(Some(public_note)) => Ok(public_note),
        Ok(None) => {
            tracing::warn!("Public note {note_id} not found");

            Err(html(StatusCode::NOT_FOUND, NOT_FOUND_PAGE.to_string()))
        }
        Err(err) => {
            tracing::error!("Error retrieving public note {note_id}: {err}");

            Err(html(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_PAGE.to_string(),
            ))
        }
    }
}

/// Get the note ID from `/notes/{note}`
fn note_id_from_uri(uri: &Uri) -> Result<String, Response> {
    let note_id = uri
        .path()
        .strip_prefix("/notes")
        .unwrap_or_default()
        .trim_matches('/');

    let note_id = url_decode_note_id(note_id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid request: Note ID contains invalid UTF-8 characters.",
        )
            .into_response()
    })?;

    if note_id.trim().is_empty() {
        tracing::warn!("Note ID not found in path");

        return Err((StatusCode::BAD_REQUEST, "Invalid request: Note ID missing.").into_response());
    }

    Ok(note_id)
}

/// URL decode a note ID
///
/// Uses percentage encoding for the decoding, might error in case of invalid UTF-8
fn url_decode_note_id(note_id: &str) -> Result<String, Utf8Error> {
    let decoded = percent_decode_str(note_id);

    decoded.decode_utf8().map(|decoded| decoded.to_string())
}

fn html(status_code: StatusCode, page: String) -> Response {
    (status_code, Html(page)).into_response()
}

/// What the page shows below the metadata
enum Body {
    /// Title, description and image
    Content,

    /// Title and a password form
    PasswordForm { failed: bool },
}

fn render_page(public_note: &PublicNote, config: &ViewerConfig, body: &Body) -> String {
    let title = escape_html(&public_note.title);

    // nothing of a protected note is shown before it is unlocked
    let (description, image_url) = match body {
        Body::Content => (
            escape_html(&public_note.description),
            public_note.image_url.as_deref(),
        ),
        Body::PasswordForm { .. } => (PROTECTED_DESCRIPTION.to_string(), None),
    };
    let preview_image_url = escape_html(image_url.unwrap_or(PLACEHOLDER_IMAGE_URL));

    let domain = &config.app_domain;
    let note_id = &public_note.note_id;
    let note_url = escape_html(&format!("https://{domain}/notes/{note_id}"));

    let content = match body {
        Body::Content => {
            let image = image_url
                .map(|image_url| {
                    format!(
                        r#"<img src="{}" alt="Note Image" style="max-width: 100%; height: auto;">"#,
                        escape_html(image_url)
                    )
                })
                .unwrap_or_default();

            format!(
                "<h1>{title}</h1>\n    <p>{}</p>\n    {image}",
                description.replace('\n', "<br>")
            )
        }
        Body::PasswordForm { failed } => {
            let error = if *failed {
                r#"<p class="error">Incorrect password.</p>"#
            } else {
                ""
            };

            format!(
                r#"<h1>{title}</h1>
    <p>{PROTECTED_DESCRIPTION}</p>
    {error}
    <form method="post">
      <input type="password" name="password" placeholder="Password" required>
      <button type="submit">Unlock</button>
    </form>"#
            )
        }
    };

    let note_data = json!({
        "noteId": note_id,
        "appUrl": format!("{}://notes/{note_id}", config.app_url_scheme),
        "webAppUrl": format!("https://{domain}/webapp/notes/{note_id}"),
        "appStoreLink": config.app_store_link,
        "playStoreLink": config.play_store_link,
    })
    .to_string()
    // keep the data from closing the script tag
    .replace('<', "\\u003c");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <meta property="og:title" content="{title}">
    <meta property="og:description" content="{description}">
    <meta property="og:image" content="{preview_image_url}">
    <meta property="og:url" content="{note_url}">
    <meta property="og:type" content="article">
    <style>{STYLE}</style>
  </head>
  <body>
    {content}
    <div id="actions">
      <button onclick="tryOpenApp()">Open in App</button>
      <button onclick="goToWebApp()">Open in Web App</button>
    </div>
    <script>
      const note = {note_data};
{SCRIPT}
    </script>
  </body>
</html>
"#
    )
}
