#[tokio::main]
async fn main() {
    chainvote::start_server().await;
}
