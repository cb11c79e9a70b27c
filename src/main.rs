use log::info;
use smtpmock::SmtpMock;
use std::env;
use std::thread;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let addr = if args.len() > 1 {
        args[1].as_str()
    } else {
        "127.0.0.1:2525"
    };

    let hostname = if args.len() > 2 {
        args[2].as_str()
    } else {
        "smtpmock.local"
    };

    let server = SmtpMock::builder()
        .bind_addr(addr)
        .hostname(hostname)
        .on_receive(|from, _to, recipients, mail| {
            info!("received mail from {from} to {recipients:?}");
            if let Some(subject) = mail.subject() {
                info!("  subject: {subject}");
            }
            Ok(())
        })
        .start();

    match server {
        Ok(server) => {
            println!("Mock SMTP server listening on {}", server.address());
            loop {
                thread::park();
            }
        }
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    }
}
