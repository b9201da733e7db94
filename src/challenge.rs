//! The browser challenge page.
//!
//! A small self-submitting HTML document: it draws a canvas, takes a 64-char
//! slice of the data URL as a fingerprint, and POSTs it back together with
//! the server-signed nonce and the path being visited. Obvious headless
//! clients bail out before submitting (`navigator.webdriver`, an implausibly
//! short data URL, a zero-width window) and are left staring at the spinner.

/// Render the challenge page for a visit to `return_to` with a freshly
/// minted `nonce`.
///
/// `return_to` values not starting with `/` are replaced by `/` here as well
/// as at verification time, so the page never echoes an absolute URL.
pub fn challenge_html(return_to: &str, nonce: &str) -> String {
    let safe_path = if return_to.starts_with('/') { return_to } else { "/" };
    let nonce_js = js_string(nonce);
    let safe_path_js = js_string(safe_path);
    format!(
        "<!DOCTYPE html><html lang='en'><head><meta charset='UTF-8'>\
         <meta name='viewport' content='width=device-width, initial-scale=1.0'>\
         <title>Verifying your access...</title>\
         <style>body{{font-family:system-ui,sans-serif;display:flex;justify-content:center;\
         align-items:center;min-height:100vh;margin:0;background:#fafafa;color:#333}}\
         main{{text-align:center;padding:2rem}}\
         .spinner{{width:40px;height:40px;border:4px solid #e0e0e0;border-top-color:#333;\
         border-radius:50%;animation:spin .8s linear infinite;margin:1rem auto}}\
         @keyframes spin{{to{{transform:rotate(360deg)}}}}</style>\
         </head><body>\
         <main role='status' aria-live='polite'>\
         <div class='spinner' aria-hidden='true'></div>\
         <p>Verifying your access&hellip;</p>\
         <noscript><p><strong>JavaScript is required to verify your access. \
         Please enable JavaScript and reload this page.</strong></p></noscript>\
         </main>\
         <script>(function(){{\
         if(navigator.webdriver)return;\
         var c=document.createElement('canvas');c.width=200;c.height=50;\
         var ctx=c.getContext('2d');if(!ctx)return;\
         ctx.font='18px Arial';ctx.fillStyle='#1a1a2e';ctx.fillText('verify',10,30);\
         var data=c.toDataURL();if(!data||data.length<100)return;\
         if(typeof window.innerWidth==='undefined'||window.innerWidth===0)return;\
         var form=document.createElement('form');form.method='POST';form.action='/__challenge/verify';\
         var fields={{nonce:{nonce_js},return_to:{safe_path_js},fp:data.slice(22,86)}};\
         for(var k in fields){{var input=document.createElement('input');\
         input.type='hidden';input.name=k;input.value=fields[k];form.appendChild(input);}}\
         document.body.appendChild(form);form.submit();}})();</script>\
         </body></html>"
    )
}

/// Encode a value as a JavaScript string literal. JSON string syntax is valid
/// JS; `/` is additionally escaped so a value can never close the
/// surrounding `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('/', "\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::mint_nonce;

    #[test]
    fn test_page_structure() {
        let html = challenge_html("/page", &mint_nonce("secret"));
        assert!(html.contains("role='status'"));
        assert!(html.contains("aria-live='polite'"));
        assert!(html.contains("class='spinner'"));
        assert!(html.contains("<noscript>"));
        assert!(html.contains("/__challenge/verify"));
        assert!(html.contains("navigator.webdriver"));
        assert!(html.contains("data.slice(22,86)"));
    }

    #[test]
    fn test_nonce_embedded_verbatim() {
        let nonce = mint_nonce("secret");
        let html = challenge_html("/page", &nonce);
        assert!(html.contains(&format!("nonce:\"{nonce}\"")));
    }

    #[test]
    fn test_return_path_sanitised() {
        let html = challenge_html("https://evil.example", "1.a");
        assert!(html.contains("return_to:\"\\/\""));
        assert!(!html.contains("evil.example"));

        let ok = challenge_html("/dest?q=1", "1.a");
        assert!(ok.contains("return_to:\"\\/dest?q=1\""));
    }

    #[test]
    fn test_script_injection_escaped() {
        let html = challenge_html("/</script><script>alert(1)", "1.a");
        // The path is JSON-escaped, so the literal tag never appears.
        assert!(!html.contains("</script><script>alert(1)"));
    }
}
