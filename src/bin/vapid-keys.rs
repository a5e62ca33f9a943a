use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }
    if let Some(unknown) = args.iter().find(|arg| arg.as_str() != "--json") {
        anyhow::bail!("unknown argument: {} (see --help)", unknown);
    }
    let json = !args.is_empty();

    let signing_key = SigningKey::random(&mut OsRng);
    let private_key = URL_SAFE_NO_PAD.encode(signing_key.to_bytes());
    let public_key = URL_SAFE_NO_PAD.encode(
        signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes(),
    );

    if json {
        let keys = serde_json::json!({
            "public_key": public_key,
            "private_key": private_key,
        });
        println!("{}", serde_json::to_string_pretty(&keys)?);
    } else {
        println!("VAPID_PUBLIC_KEY={}", public_key);
        println!("VAPID_PRIVATE_KEY={}", private_key);
        println!("VAPID_SUBJECT=mailto:admin@localhost");
    }

    Ok(())
}

fn print_help() {
    println!("vapid-keys - generate a VAPID key pair for browser push");
    println!();
    println!("Usage:");
    println!("  vapid-keys           # prints the environment variables to set");
    println!("  vapid-keys --json    # prints {{\"public_key\", \"private_key\"}}");
    println!();
    println!("Give VAPID_PUBLIC_KEY to the browser client as the applicationServerKey.");
}
