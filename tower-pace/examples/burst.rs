use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use http::Request;
use http::Response;
use http::StatusCode;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;
use tower_pace::PaceError;
use tower_pace::RateLimitLayer;

#[tokio::main]
async fn main() {
    // 1. Setup: 20 requests per second, at most 20 in flight, 2 retries on 429
    let limit = 20.try_into().unwrap();
    let unit = Duration::from_secs(1);
    let layer = RateLimitLayer::new(limit, unit).with_retries(2);

    // 2. Define a downstream that rejects every 7th call
    let calls = Arc::new(AtomicUsize::new(0));
    let service = tower::service_fn({
        let calls = calls.clone();
        move |_req: Request<()>| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let mut response = Response::new("Request Successful");
                if n % 7 == 0 {
                    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                }
                Ok::<_, tower::BoxError>(response)
            }
        }
    });

    let paced_service = layer.layer(service);

    println!("🚀 Starting Burst...");
    println!("Pacing: 20 req/s, burst 1, up to 2 retries\n");

    // 3. Fire 60 requests instantly; they are smoothed over roughly three seconds
    let start = Instant::now();
    let mut tasks = Vec::new();
    for i in 0..60 {
        let mut svc = paced_service.clone();
        tasks.push(tokio::spawn(async move {
            let result = match svc.ready().await {
                Ok(ready_svc) => ready_svc.call(Request::new(())).await,
                Err(e) => Err(e),
            };
            let at = start.elapsed();
            match result {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    println!("[{i:03}] {at:>8.2?} ⛔ Still rejected after retries")
                }
                Ok(resp) => println!("[{i:03}] {at:>8.2?} ✅ {}", resp.body().get_ref()),
                Err(e) => {
                    if let Some(pace_err) = e.downcast_ref::<PaceError>() {
                        println!("[{i:03}] {at:>8.2?} ❌ Pace error: {pace_err}");
                    } else {
                        println!("[{i:03}] {at:>8.2?} 💥 Transport error: {e}");
                    }
                }
            }
        }));
    }

    for task in tasks {
        let _ = task.await;
    }

    println!(
        "\n🏁 Burst complete: {} downstream calls in {:.2?}.",
        calls.load(Ordering::SeqCst),
        start.elapsed()
    );
}
