#[tokio::main]
async fn main() {
    if let Err(e) = medmentor_lib::run().await {
        eprintln!("medmentor: {e}");
        std::process::exit(1);
    }
}
