use clap::Parser;

#[derive(Parser)]
struct Args {
    #[clap(short, long)]
    auth_url: String,
    #[clap(short, long, default_value = "com.example.webauth")]
    callback_scheme: String,
    #[clap(short, long)]
    ephemeral: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    #[cfg(target_os = "macos")]
    macos::run(args);

    #[cfg(not(target_os = "macos"))]
    {
        let _ = args;
        eprintln!("This demo drives ASWebAuthenticationSession and only runs on macOS");
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use objc2::MainThreadMarker;
    use objc2_app_kit::{
        NSApplication, NSApplicationActivationPolicy, NSBackingStoreType, NSWindow,
        NSWindowStyleMask,
    };
    use objc2_foundation::{NSPoint, NSRect, NSSize, NSString};
    use webauth_bridge::{SessionRequest, darwin::system_adapter};

    use super::Args;

    pub fn run(args: Args) {
        let mtm = MainThreadMarker::new().expect("main runs on the main thread");
        let app = NSApplication::sharedApplication(mtm);
        app.setActivationPolicy(NSApplicationActivationPolicy::Regular);

        let window = unsafe {
            NSWindow::initWithContentRect_styleMask_backing_defer(
                mtm.alloc(),
                NSRect::new(NSPoint::new(200.0, 200.0), NSSize::new(480.0, 320.0)),
                NSWindowStyleMask::Titled,
                NSBackingStoreType::Buffered,
                false,
            )
        };
        window.setTitle(&NSString::from_str("WebAuth Demo"));
        window.makeKeyAndOrderFront(None);

        let request = SessionRequest::parse(&args.auth_url, &args.callback_scheme, args.ephemeral)
            .expect("Invalid authentication request");
        let adapter = system_adapter(Some(window)).expect("main runs on the main thread");

        let started = adapter.start(&request, |result| match result {
            Ok(url) => {
                println!("Redirected to {url}");
                std::process::exit(0);
            }
            Err(err) => {
                eprintln!("Authentication failed with {}: {err}", err.code().as_str());
                std::process::exit(1);
            }
        });
        if let Err(err) = started {
            eprintln!("Unable to start authentication ({}): {err}", err.code().as_str());
            std::process::exit(1);
        }

        app.run();
    }
}
