fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub url: &'a str,
    pub path: &'a str,
    pub retry: &'a str,
    pub err: &'a str,
}

pub fn render(event: &WarnEvent<'_>) -> String {
    format!(
        "ARCHIVER_WARN code={} stage={} url={} path={} retry={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.url),
        sanitize_value(event.path),
        sanitize_value(event.retry),
        sanitize_value(event.err),
    )
}

/// One grep-friendly line per warning, through the `log` facade.
pub fn emit(event: WarnEvent<'_>) {
    log::warn!("{}", render(&event));
}

#[cfg(test)]
mod tests {
    use super::{WarnEvent, render, sanitize_value};

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn render_keeps_field_order() {
        let line = render(&WarnEvent {
            code: "ARCHIVE_FAILED",
            stage: "single-file",
            url: "http://a.example",
            path: "",
            retry: "next-run",
            err: "exit status 1",
        });
        assert_eq!(
            line,
            "ARCHIVER_WARN code=ARCHIVE_FAILED stage=single-file url=http://a.example path=na retry=next-run err=exit_status_1"
        );
    }
}
