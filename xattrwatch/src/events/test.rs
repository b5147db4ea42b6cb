use std::pin::Pin;

use indoc::indoc;
use xattrwatch_common::FIELD_SIZE;

use super::*;
use crate::formatting::FormattingStyle;

fn field(s: &str) -> [u8; FIELD_SIZE] {
    let mut f = [0u8; FIELD_SIZE];
    let len = s.len().min(FIELD_SIZE - 1);
    f[..len].copy_from_slice(&s.as_bytes()[..len]);
    f
}

fn delivery(cpu: u32, path: &str, name: &str, value: &str) -> Delivery {
    Delivery {
        cpu,
        event: XattrEvent {
            path: field(path),
            name: field(name),
            value: field(value),
        },
    }
}

fn as_bytes(event: &XattrEvent) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(EVENT_SIZE);
    bytes.extend_from_slice(&event.path);
    bytes.extend_from_slice(&event.name);
    bytes.extend_from_slice(&event.value);
    bytes
}

async fn render(delivery: &Delivery, style: FormattingStyle) -> String {
    let mut output: Vec<u8> = vec![];
    let pin_output = Pin::new(&mut output);
    let formatter = Formatter::new(pin_output, style);

    handle_event(delivery, formatter).await.unwrap();

    String::from_utf8_lossy(&output).into_owned()
}

#[tokio::test]
async fn parse_setxattr() {
    let d = delivery(1, "/tmp/f", "user.tag", "v1");

    assert_eq!(
        render(&d, FormattingStyle::OneLine).await,
        "[cpu 1] xattr(path: \"/tmp/f\", name: \"user.tag\", value: \"v1\")\n"
    );

    assert_eq!(
        render(&d, FormattingStyle::MultiLine).await,
        indoc! {"
            [cpu 1]
            \txattr(
            \t    path: \"/tmp/f\",
            \t    name: \"user.tag\",
            \t    value: \"v1\"
            \t)
        "}
    );
}

#[tokio::test]
async fn parse_truncated_name() {
    let name = format!("user.{}", "a".repeat(75));
    let d = delivery(0, "/tmp/f", &name, "v1");

    assert_eq!(
        render(&d, FormattingStyle::OneLine).await,
        format!(
            "[cpu 0] xattr(path: \"/tmp/f\", name: {:?} ... (possibly truncated), value: \"v1\")\n",
            &name[..FIELD_SIZE - 1]
        )
    );
}

#[tokio::test]
async fn parse_empty_fields() {
    let d = delivery(3, "", "", "");

    assert_eq!(
        render(&d, FormattingStyle::OneLine).await,
        "[cpu 3] xattr(path: \"\", name: \"\", value: \"\")\n"
    );
}

#[test]
fn decode_exact_sample() {
    let d = delivery(0, "/tmp/f", "user.tag", "v1");
    let bytes = as_bytes(&d.event);
    assert_eq!(bytes.len(), EVENT_SIZE);

    assert_eq!(decode_event(&bytes), Some(d.event));
}

#[test]
fn decode_ignores_perf_padding() {
    let d = delivery(0, "/srv/a", "user.owner", "alice");
    let mut bytes = as_bytes(&d.event);
    bytes.extend_from_slice(&[0xaa; 6]);

    assert_eq!(decode_event(&bytes), Some(d.event));
}

#[test]
fn decode_rejects_short_sample() {
    let d = delivery(0, "/tmp/f", "user.tag", "v1");
    let bytes = as_bytes(&d.event);

    assert_eq!(decode_event(&bytes[..EVENT_SIZE - 1]), None);
    assert_eq!(decode_event(&[]), None);
}
