//! Server-rendered login page.

use crate::response::html_escape;

const STYLES: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: #0d0e1a;
    color: #f8f9fe;
    min-height: 100vh;
    display: flex;
    align-items: center;
    justify-content: center;
}
.card {
    width: 360px;
    padding: 2rem;
    background: rgba(20, 22, 41, 0.8);
    border: 1px solid rgba(255, 255, 255, 0.08);
    border-radius: 12px;
}
.card-title { font-size: 1.25rem; margin-bottom: 0.25rem; }
.subtitle { color: #adb5bd; font-size: 0.875rem; margin-bottom: 1.5rem; }
.form-group { margin-bottom: 1rem; }
.form-label { display: block; font-size: 0.875rem; margin-bottom: 0.375rem; color: #adb5bd; }
.form-input {
    width: 100%;
    padding: 0.625rem 0.75rem;
    background: #141629;
    border: 1px solid rgba(255, 255, 255, 0.08);
    border-radius: 6px;
    color: inherit;
}
.btn-primary {
    width: 100%;
    padding: 0.625rem;
    background: #3b3fe3;
    color: #fff;
    border: none;
    border-radius: 6px;
    cursor: pointer;
}
.alert-error {
    display: none;
    margin-bottom: 1rem;
    padding: 0.625rem 0.75rem;
    background: rgba(255, 77, 61, 0.15);
    border-radius: 6px;
    color: #ff4d3d;
    font-size: 0.875rem;
}
"#;

// Submits the credentials to the current URL (query included) and applies
// the result: JSON is an error to display, text/plain is the redirect URL,
// anything else is an auto-post form to run.
const LOGIN_SCRIPT: &str = r#"
document.getElementById('login').addEventListener('submit', async function (e) {
    e.preventDefault();
    var alert = document.getElementById('login-error');
    alert.style.display = 'none';
    var res = await fetch(window.location.href, {
        method: 'POST',
        headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
        body: new URLSearchParams(new FormData(this)).toString(),
        credentials: 'same-origin'
    });
    var type = res.headers.get('Content-Type') || '';
    var text = await res.text();
    if (type.indexOf('application/json') === 0) {
        var err = {};
        try { err = JSON.parse(text); } catch (_) {}
        alert.textContent = err.error_description || err.error || 'Sign in failed';
        alert.style.display = 'block';
    } else if (type.indexOf('text/plain') === 0) {
        window.location.assign(text);
    } else {
        var holder = document.createElement('div');
        holder.innerHTML = text;
        document.body.appendChild(holder);
        holder.querySelector('form').submit();
    }
});
"#;

fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + STYLES.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str("</title>\n    <style>");
    html.push_str(STYLES);
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(content);
    html.push_str("\n</body>\n</html>");
    html
}

/// Renders the login page shown when an authorization request has no usable
/// session. The form posts back to the authorization URL it was served from.
pub fn render_login_page(tenant: &str, client_id: &str) -> String {
    let mut content = String::with_capacity(2048);

    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"card-title\">Sign in to ");
    content.push_str(&html_escape(tenant));
    content.push_str("</div>\n<div class=\"subtitle\">to continue to ");
    content.push_str(&html_escape(client_id));
    content.push_str("</div>\n\n");

    content.push_str("<div id=\"login-error\" class=\"alert-error\"></div>\n\n");

    content.push_str("<form id=\"login\" method=\"POST\">\n");
    content.push_str("<input type=\"hidden\" name=\"grant_type\" value=\"password\">\n\n");

    content.push_str("<div class=\"form-group\">\n");
    content.push_str("<label class=\"form-label\" for=\"username\">Username</label>\n");
    content
        .push_str("<input type=\"text\" id=\"username\" name=\"username\" class=\"form-input\" ");
    content.push_str("required autocomplete=\"username\">\n");
    content.push_str("</div>\n\n");

    content.push_str("<div class=\"form-group\">\n");
    content.push_str("<label class=\"form-label\" for=\"password\">Password</label>\n");
    content.push_str(
        "<input type=\"password\" id=\"password\" name=\"password\" class=\"form-input\" ",
    );
    content.push_str("required autocomplete=\"current-password\">\n");
    content.push_str("</div>\n\n");

    content.push_str("<button type=\"submit\" class=\"btn-primary\">Sign in</button>\n");
    content.push_str("</form>\n</div>\n");

    content.push_str("<script>");
    content.push_str(LOGIN_SCRIPT);
    content.push_str("</script>");

    html_page("Sign In", &content)
}
