//! HTTP adapters against a local one-shot server

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use deskpal::llm::{ChatCompletion, ChatConfig, ChatRequest, OpenAiChatClient};
use deskpal::messages::Turn;
use deskpal::speech::{
    RecognitionConfig, RemoteTranscriber, SpeechRecognizer, SpeechSynthesizer, SynthesisConfig,
    VolcengineSynthesizer,
};
use deskpal::DeskpalError;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Serve one request with `status` and `body`; the handle yields the raw request
fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);

        let mut head = String::new();
        let mut content_length = 0;
        let mut chunked = false;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
                chunked = true;
            }
            head.push_str(&line);
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }

        let mut body = Vec::new();
        if chunked {
            loop {
                let mut size_line = String::new();
                reader.read_line(&mut size_line).unwrap();
                let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
                let mut chunk = vec![0; size + 2];
                reader.read_exact(&mut chunk).unwrap();
                if size == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..size]);
            }
        } else {
            body.resize(content_length, 0);
            reader.read_exact(&mut body).unwrap();
        }

        reader.get_mut().write_all(response.as_bytes()).unwrap();
        reader.get_mut().flush().unwrap();
        format!("{}{}", head, String::from_utf8_lossy(&body))
    });

    (url, handle)
}

fn chat_request<'a>(messages: &'a [Turn]) -> ChatRequest<'a> {
    ChatRequest {
        model: "deepseek-chat",
        messages,
        timeout: Duration::from_secs(5),
    }
}

#[test]
fn test_chat_completion_success() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#,
    );
    let client = OpenAiChatClient::new(&ChatConfig::new(url, "sk-test")).unwrap();

    let messages = vec![Turn::user("hello")];
    let reply = client.complete(&chat_request(&messages)).unwrap();
    assert_eq!(reply, "Hi there");

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /chat/completions"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
    assert!(request.contains(r#""model":"deepseek-chat""#));
    assert!(request.contains(r#""messages":[{"role":"user","content":"hello"}]"#));
}

#[test]
fn test_chat_completion_http_error() {
    let (url, server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#);
    let client = OpenAiChatClient::new(&ChatConfig::new(url, "wrong")).unwrap();

    let messages = vec![Turn::user("hello")];
    let err = client.complete(&chat_request(&messages)).unwrap_err();
    server.join().unwrap();

    match err {
        DeskpalError::TransportFailure(detail) => {
            assert!(detail.contains("401"));
            assert!(detail.contains("bad key"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_chat_completion_malformed_payload() {
    let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#);
    let client = OpenAiChatClient::new(&ChatConfig::new(url, "k")).unwrap();

    let messages = vec![Turn::user("hello")];
    let err = client.complete(&chat_request(&messages)).unwrap_err();
    server.join().unwrap();
    assert!(matches!(err, DeskpalError::MalformedResponse(_)));
}

#[test]
fn test_synthesis_request_and_decode() {
    let audio = b"RIFF\x24\x00\x00\x00WAVE";
    let body = format!(
        r#"{{"reqid":"x","code":3000,"message":"Success","data":"{}"}}"#,
        BASE64.encode(audio)
    );
    let (url, server) = serve_once("200 OK", &body);
    let config = SynthesisConfig::new("app-1", "tok-1").with_endpoint(format!("{}/api/v1/tts", url));
    let synthesizer = VolcengineSynthesizer::new(config).unwrap();

    let bytes = synthesizer.synthesize("你好", Duration::from_secs(5)).unwrap();
    assert_eq!(bytes, audio);

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /api/v1/tts"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer; tok-1"));
    assert!(request.contains(r#""appid":"app-1""#));
    assert!(request.contains(r#""operation":"query""#));
    assert!(request.contains("你好"));
}

#[test]
fn test_synthesis_http_error() {
    let (url, server) = serve_once("500 Internal Server Error", "oops");
    let config = SynthesisConfig::new("a", "t").with_endpoint(url);
    let synthesizer = VolcengineSynthesizer::new(config).unwrap();

    let err = synthesizer.synthesize("hi", Duration::from_secs(5)).unwrap_err();
    server.join().unwrap();
    assert!(matches!(err, DeskpalError::SynthesisError(ref d) if d.contains("500")));
}

#[test]
fn test_remote_transcription() {
    let (url, server) = serve_once("200 OK", r#"{"text":"你 好"}"#);
    let config = RecognitionConfig {
        base_url: url,
        api_key: "stt-key".into(),
        ..RecognitionConfig::default()
    };
    let recognizer = RemoteTranscriber::new(&config).unwrap();

    let text = recognizer
        .transcribe(&vec![0.0; 1600], 16000, Duration::from_secs(5))
        .unwrap();
    assert_eq!(text, "你 好");

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /audio/transcriptions"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer stt-key"));
    assert!(request.contains("name=\"model\""));
    assert!(request.contains("whisper-1"));
    assert!(request.contains("filename=\"speech.wav\""));
}

#[test]
fn test_unreachable_service_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = OpenAiChatClient::new(&ChatConfig::new(url, "k")).unwrap();
    let messages = vec![Turn::user("hello")];
    let err = client.complete(&chat_request(&messages)).unwrap_err();
    assert!(matches!(err, DeskpalError::TransportFailure(_)));
}
