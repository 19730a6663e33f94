//! Server-rendered HTML for the upload form and the extraction result.

use html_escape::encode_text;

const STYLE: &str = r#"<style>
  body { font-family: system-ui, sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; }
  section { border: 1px solid #ccc; border-radius: 6px; padding: 1rem; margin-bottom: 1.5rem; }
  textarea { width: 100%; min-height: 24rem; font-family: ui-monospace, monospace; }
  video, canvas { max-width: 100%; }
  button { margin: 0.5rem 0.5rem 0 0; }
</style>"#;

const INDEX_BODY: &str = r#"<h1>Extract text from a document</h1>
<section>
  <h2>Upload a file</h2>
  <form method="post" action="/upload" enctype="multipart/form-data">
    <input type="file" name="document" accept=".pdf,.jpg,.jpeg,.png,.xls,.xlsx,.docx" required>
    <button type="submit">Extract text</button>
  </form>
</section>
<section>
  <h2>Use the camera</h2>
  <video id="camera" autoplay playsinline></video>
  <canvas id="snapshot" hidden></canvas>
  <div>
    <button type="button" id="start">Start camera</button>
    <button type="button" id="capture" disabled>Capture &amp; extract</button>
  </div>
  <textarea id="camera-text" readonly placeholder="Recognized text appears here"></textarea>
</section>
<script>
  const video = document.getElementById("camera");
  const canvas = document.getElementById("snapshot");
  const output = document.getElementById("camera-text");
  const capture = document.getElementById("capture");

  document.getElementById("start").addEventListener("click", async () => {
    video.srcObject = await navigator.mediaDevices.getUserMedia({ video: true });
    capture.disabled = false;
  });

  capture.addEventListener("click", async () => {
    canvas.width = video.videoWidth;
    canvas.height = video.videoHeight;
    canvas.getContext("2d").drawImage(video, 0, 0);
    output.value = "Recognizing...";
    const response = await fetch("/upload_camera", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ image: canvas.toDataURL("image/png") }),
    });
    const body = await response.json();
    output.value = response.ok ? body.text : "Error: " + body.error;
  });
</script>"#;

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n{STYLE}\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub fn index_page() -> String {
    document("Document text extraction", INDEX_BODY)
}

/// The extracted text inside one form that posts to both download routes.
/// Browsers drop the first newline after `<textarea>`, hence the extra one.
pub fn result_page(file_name: &str, text: &str) -> String {
    let body = format!(
        r#"<h1>Extracted text</h1>
<p>Source: <strong>{file_name}</strong></p>
<form method="post" action="/download_txt">
  <textarea name="text">
{text}</textarea>
  <button type="submit">Download as .txt</button>
  <button type="submit" formaction="/download_pdf">Download as .pdf</button>
</form>
<p><a href="/">Extract another document</a></p>"#,
        file_name = encode_text(file_name),
        text = encode_text(text),
    );
    document("Extracted text", &body)
}
