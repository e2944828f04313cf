use axum::response::Html;
use std::sync::LazyLock;
use tera::{Context, Tera};

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Weather Gateway</title>
</head>
<body>
  <h1>Weather forecast</h1>
  <form action="/weather" method="get">
    <label>Location <input name="location" required></label>
    <label>City <input name="city"></label>
    <label>Start <input name="start" type="date"></label>
    <label>End <input name="end" type="date"></label>
    <label>Daily data <input name="daily-data" placeholder="days,hours,alerts"></label>
    <button type="submit">Get forecast</button>
  </form>
  <p>Forecasts are available for the next {{ forecast_days }} days.</p>
</body>
</html>
"#;

const ERROR_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Weather Gateway - Error</title>
</head>
<body>
  <h1>Something went wrong</h1>
  <p class="error">{{ error }}</p>
  <a href="/">Back</a>
</body>
</html>
"#;

// Served when a template fails to render, so no message can slip through unescaped.
const FALLBACK_ERROR_PAGE: &str =
    "<!DOCTYPE html><html><body><h1>Something went wrong</h1></body></html>";

// `.html` names turn on tera's autoescaping.
static TEMPLATES: LazyLock<Tera> = LazyLock::new(|| {
    let mut tera = Tera::default();
    if let Err(e) = tera.add_raw_templates(vec![
        ("index.html", INDEX_TEMPLATE),
        ("error.html", ERROR_TEMPLATE),
    ]) {
        tracing::error!("Failed to register page templates: {}", e);
    }
    tera
});

fn render(name: &str, context: &Context) -> Html<String> {
    match TEMPLATES.render(name, context) {
        Ok(page) => Html(page),
        Err(e) => {
            tracing::error!("Failed to render {}: {}", name, e);
            Html(FALLBACK_ERROR_PAGE.to_string())
        }
    }
}

pub fn index_page() -> Html<String> {
    let mut context = Context::new();
    context.insert("forecast_days", &(crate::forecast::request::MAX_DAYS_AHEAD + 1));
    render("index.html", &context)
}

pub fn error_page(error: &str) -> Html<String> {
    let mut context = Context::new();
    context.insert("error", error);
    render("error.html", &context)
}
