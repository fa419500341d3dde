use serde_json::json;
use serde_json::Value;

/// Renders frames the way the recognition service writes them onto the wire.
pub fn sse_body(frames: &[Value]) -> String {
    return frames
        .iter()
        .map(|frame| return format!("data: {frame}\n\n"))
        .collect::<Vec<String>>()
        .join("");
}

/// A two page PDF job streamed from start to finish.
pub fn paginated_job_fixture() -> Vec<Value> {
    return vec![
        json!({"type": "start", "message": "processing", "start_time": "2025-01-01T00:00:00", "job_id": "j1"}),
        json!({"type": "chunk", "text": "Hello", "page": 1, "total": 2, "job_id": "j1", "image_url": "/outputs/j1/page_1.png"}),
        json!({"type": "chunk", "text": "World", "page": 2, "total": 2, "job_id": "j1"}),
        json!({"type": "metadata", "mode": "base", "output_format": "markdown", "prompt_used": "<image>\n<|grounding|>Convert the document to markdown.", "timestamp": "20250101_000000_000000", "duration_ms": 480, "final_text_length": 10, "image_urls": [], "job_id": "j1"}),
        json!({"type": "done", "duration_ms": 500, "job_id": "j1"}),
    ];
}

/// Synchronous endpoint response for a single image.
pub fn recognition_response_fixture() -> Value {
    return json!({
        "success": true,
        "data": {
            "text": "Fallback text",
            "mode": "base",
            "output_format": "markdown",
            "prompt_used": "<image>\n<|grounding|>Convert the document to markdown.",
            "timestamp": "20250101_000000_000000",
            "duration_ms": 1200,
            "image_urls": ["/outputs/20250101_000000_000000/result.png"]
        }
    });
}
