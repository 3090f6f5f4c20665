use axum::{body::Body, http::header, response::Response};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use crate::db;
use crate::routes::database_error;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// True when the URL carries its own scheme (`https://...`, `mailto:...`).
fn is_absolute_url(url: &str) -> bool {
    match url.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Last-modified falls back through update, publish, and the current time,
/// reported at calendar-day precision.
fn last_modified(
    updated_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
) -> NaiveDate {
    updated_at
        .or(published_at)
        .unwrap_or_else(Utc::now)
        .date_naive()
}

#[derive(Debug, FromRow)]
struct SitemapRow {
    slug: String,
    canonical_url: String,
    published_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

fn render_sitemap(base_url: &str, rows: &[SitemapRow]) -> String {
    let mut entries = String::new();
    for row in rows {
        let location = if !row.canonical_url.is_empty() && is_absolute_url(&row.canonical_url) {
            row.canonical_url.clone()
        } else if !row.canonical_url.is_empty() {
            join_url(base_url, &row.canonical_url)
        } else {
            join_url(base_url, &format!("/blog/{}", row.slug))
        };
        let lastmod = last_modified(Some(row.updated_at), row.published_at);
        entries.push_str(&format!(
            "  <url>\n\
             \x20   <loc>{}</loc>\n\
             \x20   <lastmod>{}</lastmod>\n\
             \x20   <changefreq>monthly</changefreq>\n\
             \x20   <priority>0.7</priority>\n\
             \x20 </url>\n",
            escape_xml(&location),
            lastmod.format("%Y-%m-%d"),
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"{}\">\n{}</urlset>\n",
        SITEMAP_NS, entries,
    )
}

/// GET /blog/sitemap.xml - One `<url>` entry per visible published post.
pub async fn blog_sitemap() -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return Response::builder()
                .status(503)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("Service unavailable"))
                .unwrap();
        }
    };

    let base_url =
        std::env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    // A failed query must not degrade into an empty-but-cacheable document.
    let rows: Vec<SitemapRow> = match sqlx::query_as(
        r#"
            SELECT slug, canonical_url, published_at, updated_at
            FROM posts
            WHERE status = 'published'
              AND published_at IS NOT NULL
              AND published_at <= now()
            ORDER BY published_at DESC, created_at DESC
            "#,
    )
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(rows) => rows,
        Err(e) => return database_error("listing sitemap posts", e),
    };

    let xml = render_sitemap(&base_url, &rows);

    Response::builder()
        .status(200)
        .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
        .header(
            header::CACHE_CONTROL,
            "public, max-age=3600, stale-while-revalidate=600",
        )
        .body(Body::from(xml))
        .unwrap()
}
