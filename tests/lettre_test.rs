//! Client-driven tests using lettre as a real SMTP client

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use smtpmock::SmtpMock;
use std::collections::BTreeSet;
use std::thread;

fn transport(server: &SmtpMock) -> SmtpTransport {
    SmtpTransport::builder_dangerous(server.address().ip().to_string())
        .port(server.address().port())
        .build()
}

fn sample_message(subject: &str) -> Message {
    Message::builder()
        .from("Hanako <hanako@example.com>".parse::<Mailbox>().unwrap())
        .to("Tarou <tarou@example.com>".parse::<Mailbox>().unwrap())
        .subject(subject)
        .body("Hello World".to_string())
        .unwrap()
}

#[test]
fn test_basic_send() {
    let server = SmtpMock::builder().start().unwrap();
    let mailer = transport(&server);

    mailer.send(&sample_message("Basic")).unwrap();

    let sessions = server.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].from(), "hanako@example.com");
    assert_eq!(sessions[0].recipients(), vec!["tarou@example.com"]);

    let messages = server.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject(), Some("Basic"));
    assert_eq!(messages[0].body().trim_end(), "Hello World");
}

#[test]
fn test_to_header_matches_recipient() {
    let server = SmtpMock::builder().start().unwrap();
    let mailer = transport(&server);

    let message = Message::builder()
        .from("sender@example.com".parse::<Mailbox>().unwrap())
        .to("recipient@example.com".parse::<Mailbox>().unwrap())
        .subject("Header check")
        .body("body".to_string())
        .unwrap();
    mailer.send(&message).unwrap();

    let session = &server.sessions()[0];
    let mail = server.messages().remove(0);
    let header_to = mail.header("To").unwrap();
    let header_to = header_to.trim_start_matches('<').trim_end_matches('>');
    assert_eq!(Some(header_to.to_string()), session.to());
}

#[test]
fn test_multiple_recipients() {
    let server = SmtpMock::builder().start().unwrap();
    let mailer = transport(&server);

    let message = Message::builder()
        .from("sender@example.com".parse::<Mailbox>().unwrap())
        .to("second@example.com".parse::<Mailbox>().unwrap())
        .to("first@example.com".parse::<Mailbox>().unwrap())
        .subject("Fan out")
        .body("body".to_string())
        .unwrap();
    mailer.send(&message).unwrap();

    let mut recipients = server.sessions()[0].recipients();
    assert_eq!(recipients.len(), 2);
    recipients.sort();
    assert_eq!(recipients, vec!["first@example.com", "second@example.com"]);
}

#[test]
fn test_auth_with_matching_credentials() {
    let server = SmtpMock::builder()
        .credentials("alice", "hunter2")
        .start()
        .unwrap();
    let mailer = SmtpTransport::builder_dangerous(server.address().ip().to_string())
        .port(server.address().port())
        .credentials(Credentials::new("alice".to_string(), "hunter2".to_string()))
        .build();

    mailer.send(&sample_message("Authed")).unwrap();

    assert_eq!(server.sessions().len(), 1);
    assert_eq!(server.messages().len(), 1);
}

#[test]
fn test_auth_with_wrong_credentials() {
    let server = SmtpMock::builder()
        .credentials("alice", "hunter2")
        .start()
        .unwrap();
    let mailer = SmtpTransport::builder_dangerous(server.address().ip().to_string())
        .port(server.address().port())
        .credentials(Credentials::new("alice".to_string(), "wrong".to_string()))
        .build();

    assert!(mailer.send(&sample_message("Denied")).is_err());
    assert!(server.messages().is_empty());
}

#[test]
fn test_observer_rejection_fails_send() {
    let server = SmtpMock::builder()
        .on_receive(|_from, _to, _recipients, _mail| Err("rejected".into()))
        .start()
        .unwrap();
    let mailer = transport(&server);

    assert!(mailer.send(&sample_message("Vetoed")).is_err());
}

#[test]
fn test_concurrent_sends() {
    let server = SmtpMock::builder().start().unwrap();
    let address = server.address();

    let handles: Vec<_> = (0..100)
        .map(|i| {
            thread::spawn(move || {
                let mailer = SmtpTransport::builder_dangerous(address.ip().to_string())
                    .port(address.port())
                    .build();
                mailer.send(&sample_message(&format!("msg-{i}"))).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let messages = server.messages();
    assert_eq!(messages.len(), 100);

    let subjects: BTreeSet<String> = messages
        .iter()
        .map(|mail| mail.subject().unwrap().to_string())
        .collect();
    let expected: BTreeSet<String> = (0..100).map(|i| format!("msg-{i}")).collect();
    assert_eq!(subjects, expected);
}

#[test]
fn test_raw_round_trip() {
    let server = SmtpMock::builder().start().unwrap();
    let mailer = transport(&server);

    mailer.send(&sample_message("Round trip")).unwrap();

    let raw = server.raw_messages().remove(0);
    let reparsed = mailparse::parse_mail(&raw).unwrap();
    assert_eq!(reparsed.get_body().unwrap(), server.messages()[0].body());
}

#[test]
fn test_snapshots_are_idempotent() {
    let server = SmtpMock::builder().start().unwrap();
    let mailer = transport(&server);

    mailer.send(&sample_message("One")).unwrap();
    mailer.send(&sample_message("Two")).unwrap();

    let first = server.messages();
    let second = server.messages();
    assert_eq!(first.len(), second.len());
    assert_eq!(server.sessions().len(), server.sessions().len());
}
