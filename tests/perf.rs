use serde_json::json;
use std::time::Instant;

const BASE_URL: &str = "http://127.0.0.1:3000";
const NUM_USERS: usize = 100;
const POSTS_PER_USER: usize = 2;

async fn register_and_login(
    client: &reqwest::Client,
    username: &str,
    password: &str,
) -> Option<String> {
    let email = format!("{}@perf.example.com", username);

    let reg = client
        .post(format!("{}/users/registration", BASE_URL))
        .json(&json!({"userName": username, "email": email, "password": password}))
        .send()
        .await
        .ok()?;
    if reg.status() != 201 {
        return None;
    }
    let body = reg.json::<serde_json::Value>().await.ok()?;
    let verify_path = body["verifyEmail"].as_str()?;
    client
        .get(format!("{}{}", BASE_URL, verify_path))
        .send()
        .await
        .ok()?;

    let login = client
        .post(format!("{}/users/login", BASE_URL))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .ok()?;
    if login.status() != 200 {
        return None;
    }
    let token_data = login.json::<serde_json::Value>().await.ok()?;
    token_data["token"].as_str().map(|t| t.to_string())
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn perf_test_users_with_posts() {
    let client = reqwest::Client::new();
    let start = Instant::now();

    println!("\n=== Performance Test ===");
    println!("Creating {} users with {} posts each...", NUM_USERS, POSTS_PER_USER);

    let mut tokens = Vec::new();

    let user_creation_start = Instant::now();
    for i in 0..NUM_USERS {
        let username = format!(
            "perf_user_{}_{}",
            i,
            &uuid::Uuid::new_v4().to_string()[0..8]
        );
        if let Some(token) = register_and_login(&client, &username, "password123").await {
            tokens.push(token);
        }

        if (i + 1) % 50 == 0 {
            println!("  Created {}/{} users", i + 1, NUM_USERS);
        }
    }
    let user_creation_time = user_creation_start.elapsed();

    println!(
        "User creation done: {} users in {:.2}s ({:.2} users/sec)",
        tokens.len(),
        user_creation_time.as_secs_f64(),
        tokens.len() as f64 / user_creation_time.as_secs_f64()
    );

    let post_creation_start = Instant::now();
    let mut posts_created = 0;
    let mut posts_failed = 0;

    for (idx, token) in tokens.iter().enumerate() {
        for post_num in 0..POSTS_PER_USER {
            let description = format!("perf {} {}", idx, post_num + 1);

            let post_resp = client
                .post(format!("{}/users/post", BASE_URL))
                .query(&[("description", description.as_str())])
                .header("Authorization", format!("Bearer {}", token))
                .body(vec![0x89u8, 0x50, 0x4e, 0x47])
                .send()
                .await;

            match post_resp {
                Ok(resp) if resp.status() == 201 => posts_created += 1,
                _ => posts_failed += 1,
            }
        }

        if (idx + 1) % 50 == 0 {
            println!(
                "  Processed {}/{} users ({} posts created)",
                idx + 1,
                tokens.len(),
                posts_created
            );
        }
    }
    let post_creation_time = post_creation_start.elapsed();

    let total_time = start.elapsed();
    let total_requests = tokens.len() + posts_created + posts_failed;

    println!("\n=== Results ===");
    println!("Total time: {:.2}s", total_time.as_secs_f64());
    println!("User creation: {:.2}s", user_creation_time.as_secs_f64());
    println!("Post creation: {:.2}s", post_creation_time.as_secs_f64());
    println!("Users created: {}", tokens.len());
    println!("Posts created: {}", posts_created);
    println!("Posts failed: {}", posts_failed);
    println!(
        "Avg time per request: {:.2}ms",
        (total_time.as_secs_f64() * 1000.0) / total_requests as f64
    );
    println!(
        "Throughput: {:.0} requests/sec",
        total_requests as f64 / total_time.as_secs_f64()
    );
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn perf_test_wide_timeline() {
    let client = reqwest::Client::new();

    println!("\n=== Timeline Performance Test ===");

    let reader = format!("reader_{}", &uuid::Uuid::new_v4().to_string()[0..8]);
    let Some(reader_token) = register_and_login(&client, &reader, "password123").await else {
        println!("Failed to create reader");
        return;
    };

    // 20 followed accounts with 5 posts each
    for i in 0..20 {
        let username = format!("author_{}_{}", i, &uuid::Uuid::new_v4().to_string()[0..8]);
        let Some(token) = register_and_login(&client, &username, "password123").await else {
            continue;
        };

        let me = client
            .get(format!("{}/users/me", BASE_URL))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        let author_id = me["id"].as_str().unwrap().to_string();

        for p in 0..5 {
            let _ = client
                .post(format!("{}/users/post", BASE_URL))
                .query(&[("description", format!("post {}", p).as_str())])
                .header("Authorization", format!("Bearer {}", token))
                .body(vec![1u8, 2, 3])
                .send()
                .await;
        }

        let _ = client
            .put(format!("{}/users/{}/follow", BASE_URL, author_id))
            .header("Authorization", format!("Bearer {}", reader_token))
            .send()
            .await;
    }

    let fetch_start = Instant::now();
    let feed_resp = client
        .get(format!("{}/posts/timeline/all", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader_token))
        .send()
        .await
        .unwrap();
    let fetch_time = fetch_start.elapsed();

    let feed = feed_resp.json::<serde_json::Value>().await.unwrap();
    println!("Timeline posts: {}", feed.as_array().map(|a| a.len()).unwrap_or(0));
    println!("Timeline fetch time: {:.2}ms", fetch_time.as_secs_f64() * 1000.0);
}
